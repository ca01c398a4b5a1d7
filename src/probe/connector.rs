use super::registry;
use super::tls::{Alert, HandshakeConstraints, HandshakeError, Handshaker, Negotiated, Session};
use crate::model::{Config, Endpoint, ProtocolVersion};
use async_trait::async_trait;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;

// Legacy versions and suites are refused by OpenSSL 3 at its default
// security level even when explicitly configured.
const SECURITY_LEVEL: &str = "@SECLEVEL=0";
const DEFAULT_CIPHERS: &str = "ALL";

/// Handshake primitive backed by OpenSSL over a fresh TCP connection per
/// attempt.
#[derive(Debug, Clone)]
pub struct OpensslConnector {
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl OpensslConnector {
    pub fn new(connect_timeout: Duration, handshake_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            handshake_timeout,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.connect_timeout, cfg.handshake_timeout)
    }
}

#[async_trait]
impl Handshaker for OpensslConnector {
    async fn negotiate(
        &self,
        endpoint: &Endpoint,
        constraints: &HandshakeConstraints,
    ) -> Result<Box<dyn Session>, HandshakeError> {
        let connector = build_connector(constraints)?;

        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        let stream = match timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(HandshakeError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(HandshakeError::Timeout {
                    stage: "connect",
                    after: self.connect_timeout,
                })
            }
        };

        let ssl = connector
            .configure()
            .map_err(|err| HandshakeError::Config(err.to_string()))?
            .verify_hostname(constraints.verify_peer)
            .into_ssl(&endpoint.host)
            .map_err(|err| HandshakeError::Config(err.to_string()))?;
        let mut tls_stream =
            SslStream::new(ssl, stream).map_err(|err| HandshakeError::Config(err.to_string()))?;

        match timeout(self.handshake_timeout, Pin::new(&mut tls_stream).connect()).await {
            Ok(Ok(())) => Ok(Box::new(OpensslSession {
                stream: tls_stream,
                close_timeout: self.handshake_timeout,
            })),
            Ok(Err(err)) => Err(classify_ssl_error(&err)),
            Err(_) => Err(HandshakeError::Timeout {
                stage: "handshake",
                after: self.handshake_timeout,
            }),
        }
    }
}

struct OpensslSession {
    stream: SslStream<TcpStream>,
    close_timeout: Duration,
}

#[async_trait]
impl Session for OpensslSession {
    fn negotiated(&self) -> Negotiated {
        let ssl = self.stream.ssl();
        Negotiated {
            version: version_from_str(ssl.version_str()),
            cipher: ssl
                .current_cipher()
                .and_then(|cipher| registry::suite_by_openssl_name(cipher.name()))
                .map(|info| info.id),
        }
    }

    async fn close(&mut self) {
        let _ = timeout(self.close_timeout, self.stream.shutdown()).await;
    }
}

fn build_connector(constraints: &HandshakeConstraints) -> Result<SslConnector, HandshakeError> {
    let config_err = |err: openssl::error::ErrorStack| HandshakeError::Config(err.to_string());

    let mut builder = SslConnector::builder(SslMethod::tls()).map_err(config_err)?;
    builder
        .set_min_proto_version(Some(ssl_version(constraints.min_version)?))
        .map_err(config_err)?;
    builder
        .set_max_proto_version(Some(ssl_version(constraints.max_version)?))
        .map_err(config_err)?;

    let ciphers = match &constraints.cipher_suites {
        Some(suites) => openssl_cipher_list(suites)?,
        None => DEFAULT_CIPHERS.to_string(),
    };
    builder
        .set_cipher_list(&format!("{ciphers}:{SECURITY_LEVEL}"))
        .map_err(|err| {
            HandshakeError::Config(format!("local library cannot offer {ciphers}: {err}"))
        })?;

    if !constraints.verify_peer {
        builder.set_verify(SslVerifyMode::NONE);
    }

    Ok(builder.build())
}

/// Whether the local OpenSSL build accepts `openssl_name` as a cipher list
/// at the security level every handshake runs with.
pub(super) fn can_offer(openssl_name: &str) -> bool {
    SslConnector::builder(SslMethod::tls())
        .and_then(|mut builder| {
            builder.set_cipher_list(&format!("{openssl_name}:{SECURITY_LEVEL}"))
        })
        .is_ok()
}

fn openssl_cipher_list(suites: &[crate::model::CipherSuite]) -> Result<String, HandshakeError> {
    if suites.is_empty() {
        return Err(HandshakeError::Config("empty cipher suite list".into()));
    }

    let names = suites
        .iter()
        .map(|suite| {
            registry::suite_info(*suite)
                .map(|info| info.openssl_name)
                .ok_or_else(|| HandshakeError::Config(format!("unknown cipher suite {suite}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.join(":"))
}

fn ssl_version(version: ProtocolVersion) -> Result<SslVersion, HandshakeError> {
    match version {
        ProtocolVersion::TLS1_0 => Ok(SslVersion::TLS1),
        ProtocolVersion::TLS1_1 => Ok(SslVersion::TLS1_1),
        ProtocolVersion::TLS1_2 => Ok(SslVersion::TLS1_2),
        ProtocolVersion::TLS1_3 => Ok(SslVersion::TLS1_3),
        other => Err(HandshakeError::Config(format!(
            "unsupported protocol version {other}"
        ))),
    }
}

fn version_from_str(version: &str) -> Option<ProtocolVersion> {
    match version {
        "TLSv1" => Some(ProtocolVersion::TLS1_0),
        "TLSv1.1" => Some(ProtocolVersion::TLS1_1),
        "TLSv1.2" => Some(ProtocolVersion::TLS1_2),
        "TLSv1.3" => Some(ProtocolVersion::TLS1_3),
        "SSLv3" => Some(ProtocolVersion(0x0300)),
        _ => None,
    }
}

fn classify_ssl_error(err: &openssl::ssl::Error) -> HandshakeError {
    if let Some(stack) = err.ssl_error() {
        for entry in stack.errors() {
            if let Some(classified) = entry.reason().and_then(classify_reason) {
                return classified;
            }
        }
        return HandshakeError::Protocol(stack.to_string());
    }

    if let Some(io) = err.io_error() {
        return HandshakeError::Protocol(format!("transport error: {io}"));
    }

    HandshakeError::Protocol(err.to_string())
}

/// Maps an OpenSSL error reason onto the handshake taxonomy.
fn classify_reason(reason: &str) -> Option<HandshakeError> {
    let reason = reason.to_ascii_lowercase();
    if reason.contains("alert protocol version") {
        Some(HandshakeError::Alert(Alert::ProtocolVersion))
    } else if reason.contains("alert handshake failure") {
        Some(HandshakeError::Alert(Alert::HandshakeFailure))
    } else if reason.contains("alert insufficient security") {
        Some(HandshakeError::Alert(Alert::InsufficientSecurity))
    } else if reason.contains(" alert ") {
        Some(HandshakeError::Alert(Alert::Other(reason)))
    } else if reason.contains("no protocols available") || reason.contains("unsupported protocol")
    {
        Some(HandshakeError::NoMutualVersion(reason))
    } else {
        None
    }
}
