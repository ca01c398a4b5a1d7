use crate::model::{CipherSuite, Endpoint, ProtocolVersion};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Limits applied to a single handshake attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConstraints {
    pub min_version: ProtocolVersion,
    pub max_version: ProtocolVersion,
    /// `None` leaves the connector's broad default cipher list in place.
    pub cipher_suites: Option<Vec<CipherSuite>>,
    pub verify_peer: bool,
}

impl HandshakeConstraints {
    /// Only `version` is acceptable; certificates are not checked.
    pub fn pinned_version(version: ProtocolVersion) -> Self {
        Self {
            min_version: version,
            max_version: version,
            cipher_suites: None,
            verify_peer: false,
        }
    }

    /// TLS 1.2 with exactly one suite on offer.
    pub fn pinned_cipher(cipher: CipherSuite) -> Self {
        Self {
            cipher_suites: Some(vec![cipher]),
            ..Self::pinned_version(ProtocolVersion::TLS1_2)
        }
    }
}

/// What the server agreed to. `None` means the connector could not map the
/// value back to a known code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Negotiated {
    pub version: Option<ProtocolVersion>,
    pub cipher: Option<CipherSuite>,
}

/// Fatal alerts received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    HandshakeFailure,
    ProtocolVersion,
    InsufficientSecurity,
    Other(String),
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::HandshakeFailure => write!(f, "handshake failure"),
            Alert::ProtocolVersion => write!(f, "protocol version not supported"),
            Alert::InsufficientSecurity => write!(f, "insufficient security"),
            Alert::Other(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    /// Either side could not settle on a version inside the pinned range.
    #[error("no mutually supported protocol version: {0}")]
    NoMutualVersion(String),

    #[error("remote error: {0}")]
    Alert(Alert),

    #[error("invalid handshake configuration: {0}")]
    Config(String),

    #[error("handshake failed: {0}")]
    Protocol(String),
}

/// An established TLS session. Dropping it releases the socket.
#[async_trait]
pub trait Session: Send {
    fn negotiated(&self) -> Negotiated;

    /// Sends close_notify. Errors are ignored; the session is finished with
    /// either way.
    async fn close(&mut self);
}

/// The transport + handshake primitive the probers drive.
#[async_trait]
pub trait Handshaker: Send + Sync {
    async fn negotiate(
        &self,
        endpoint: &Endpoint,
        constraints: &HandshakeConstraints,
    ) -> Result<Box<dyn Session>, HandshakeError>;
}
