use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tls_prober::engine::Engine;
use tls_prober::model::{
    CipherSuite, Config, Endpoint, OutputConfig, OutputFormat, ProtocolVersion, ScanSelection,
};
use tls_prober::output::diagnostics::DiagnosticLog;
use tls_prober::probe::{
    registry, Alert, CapabilityProbe, HandshakeConstraints, HandshakeError, Handshaker,
    Negotiated, Session,
};

type Behaviour =
    dyn Fn(&HandshakeConstraints) -> Result<Negotiated, HandshakeError> + Send + Sync;

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    released: AtomicUsize,
}

struct FakeSession {
    negotiated: Negotiated,
    close_delay: Duration,
    counters: Arc<Counters>,
}

#[async_trait]
impl Session for FakeSession {
    fn negotiated(&self) -> Negotiated {
        self.negotiated
    }

    async fn close(&mut self) {
        tokio::time::sleep(self.close_delay).await;
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scripted handshake primitive that records every attempt.
struct FakeServer {
    behaviour: Box<Behaviour>,
    delay: fn(&HandshakeConstraints) -> Duration,
    close_delay: Duration,
    attempts: Mutex<Vec<HandshakeConstraints>>,
    counters: Arc<Counters>,
}

impl FakeServer {
    fn new(
        behaviour: impl Fn(&HandshakeConstraints) -> Result<Negotiated, HandshakeError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            behaviour: Box::new(behaviour),
            delay: |_| Duration::ZERO,
            close_delay: Duration::ZERO,
            attempts: Mutex::default(),
            counters: Arc::default(),
        }
    }

    /// Behaves like a server that speaks exactly `versions` and `ciphers`.
    fn speaking(versions: Vec<ProtocolVersion>, ciphers: Vec<CipherSuite>) -> Self {
        Self::new(move |constraints| {
            let version = constraints.min_version;
            if !versions.contains(&version) {
                return Err(HandshakeError::Alert(Alert::ProtocolVersion));
            }
            let cipher = match &constraints.cipher_suites {
                Some(offered) => match offered.iter().find(|suite| ciphers.contains(suite)) {
                    Some(suite) => Some(*suite),
                    None => return Err(HandshakeError::Alert(Alert::HandshakeFailure)),
                },
                None => ciphers.first().copied(),
            };
            Ok(Negotiated {
                version: Some(version),
                cipher,
            })
        })
    }

    fn attempted_versions(&self) -> Vec<ProtocolVersion> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|constraints| constraints.min_version)
            .collect()
    }
}

#[async_trait]
impl Handshaker for FakeServer {
    async fn negotiate(
        &self,
        _endpoint: &Endpoint,
        constraints: &HandshakeConstraints,
    ) -> Result<Box<dyn Session>, HandshakeError> {
        self.attempts.lock().unwrap().push(constraints.clone());
        tokio::time::sleep((self.delay)(constraints)).await;
        let negotiated = (self.behaviour)(constraints)?;
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            negotiated,
            close_delay: self.close_delay,
            counters: self.counters.clone(),
        }))
    }
}

fn config(concurrency: usize) -> Config {
    Config {
        target: None,
        input: None,
        concurrency,
        rate: 1000,
        connect_timeout: Duration::from_secs(1),
        handshake_timeout: Duration::from_secs(1),
        probe_timeout: Duration::from_secs(5),
        selection: ScanSelection::All,
        output: OutputConfig {
            format: OutputFormat::Jsonl,
        },
    }
}

fn endpoint() -> Endpoint {
    Endpoint::new("server.test", 443)
}

const V1: ProtocolVersion = ProtocolVersion::TLS1_0;
const V2: ProtocolVersion = ProtocolVersion::TLS1_1;
const V3: ProtocolVersion = ProtocolVersion::TLS1_2;
const V4: ProtocolVersion = ProtocolVersion::TLS1_3;

#[tokio::test]
async fn keeps_supported_versions_in_enumeration_order() {
    let server = FakeServer::speaking(vec![V3, V2], vec![]);
    let engine = Engine::with_handshaker(config(1), server).unwrap();
    let log = DiagnosticLog::default();

    let report = engine
        .scan(&endpoint(), &[V1, V2, V3, V4], &CapabilityProbe::versions(), &log)
        .await;

    assert_eq!(report.supported(), &[V2, V3]);
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn transport_error_is_reported_once_and_scan_continues() {
    let server = FakeServer::new(|constraints| match constraints.min_version {
        V2 => Err(HandshakeError::Connect {
            endpoint: "server.test:443".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "failed to lookup address"),
        }),
        V3 => Ok(Negotiated {
            version: Some(V3),
            cipher: None,
        }),
        _ => Err(HandshakeError::Alert(Alert::ProtocolVersion)),
    });
    let log = DiagnosticLog::default();
    let engine = Engine::with_handshaker(config(1), server).unwrap();

    let report = engine
        .scan(&endpoint(), &[V1, V2, V3, V4], &CapabilityProbe::versions(), &log)
        .await;

    assert_eq!(report.supported(), &[V3]);
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].capability, "TLS 1.1");
    assert!(entries[0].message.contains("failed to lookup address"));
}

#[tokio::test]
async fn later_candidates_are_still_attempted_after_an_error() {
    let server = FakeServer::new(|constraints| match constraints.min_version {
        V2 => Err(HandshakeError::Timeout {
            stage: "connect",
            after: Duration::from_secs(1),
        }),
        other => Ok(Negotiated {
            version: Some(other),
            cipher: None,
        }),
    });
    let engine = Engine::with_handshaker(config(1), server).unwrap();
    let log = DiagnosticLog::default();

    let report = engine
        .scan(&endpoint(), &[V1, V2, V3, V4], &CapabilityProbe::versions(), &log)
        .await;

    assert_eq!(report.supported(), &[V1, V3, V4]);
}

#[tokio::test]
async fn negotiating_the_wrong_version_is_an_error() {
    let server = FakeServer::new(|constraints| {
        let version = if constraints.min_version == V1 {
            V3
        } else {
            constraints.min_version
        };
        Ok(Negotiated {
            version: Some(version),
            cipher: None,
        })
    });
    let engine = Engine::with_handshaker(config(1), server).unwrap();
    let log = DiagnosticLog::default();

    let report = engine
        .scan(&endpoint(), &[V1, V2], &CapabilityProbe::versions(), &log)
        .await;

    assert_eq!(report.supported(), &[V2]);
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].capability, "TLS 1.0");
    assert!(entries[0].message.contains("negotiated unexpected TLS version TLS 1.2"));
}

#[tokio::test]
async fn server_rejecting_everything_yields_empty_report() {
    let server = FakeServer::speaking(vec![], vec![]);
    let engine = Engine::with_handshaker(config(1), server).unwrap();
    let log = DiagnosticLog::default();

    let report = engine
        .scan(
            &endpoint(),
            registry::protocol_versions(),
            &CapabilityProbe::versions(),
            &log,
        )
        .await;

    assert!(report.is_empty());
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn every_opened_session_is_released() {
    let server = Arc::new(FakeServer::new(|constraints| {
        if constraints.min_version == V4 {
            return Err(HandshakeError::Protocol("connection reset".into()));
        }
        if constraints.min_version == V1 {
            return Err(HandshakeError::NoMutualVersion("no protocols available".into()));
        }
        // V2 negotiates something unexpected, V3 succeeds.
        Ok(Negotiated {
            version: Some(V3),
            cipher: None,
        })
    }));
    let counters = server.counters.clone();
    let engine = Engine::with_handshaker(config(1), SharedServer(server)).unwrap();
    let log = DiagnosticLog::default();

    let report = engine
        .scan(&endpoint(), &[V1, V2, V3, V4], &CapabilityProbe::versions(), &log)
        .await;

    assert_eq!(report.supported(), &[V3]);
    assert_eq!(log.entries().len(), 2);
    assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
    assert_eq!(counters.released.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_probes_preserve_enumeration_order() {
    let mut server = FakeServer::speaking(vec![V1, V2, V3, V4], vec![]);
    // Earlier candidates finish last.
    server.delay =
        |constraints| Duration::from_millis(u64::from(0x0310 - constraints.min_version.0) * 10);
    let server = Arc::new(server);
    let engine = Engine::with_handshaker(config(4), SharedServer(server.clone())).unwrap();
    let log = DiagnosticLog::default();

    let report = engine
        .scan(&endpoint(), &[V1, V2, V3, V4], &CapabilityProbe::versions(), &log)
        .await;

    assert_eq!(report.supported(), &[V1, V2, V3, V4]);
    assert_eq!(server.attempted_versions().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn stalled_handshake_times_out_and_scan_moves_on() {
    let mut server = FakeServer::speaking(vec![V1, V2, V3, V4], vec![]);
    // TLS 1.1 never answers within the overall bound.
    server.delay = |constraints| {
        if constraints.min_version == V2 {
            Duration::from_secs(3600)
        } else {
            Duration::ZERO
        }
    };
    let server = Arc::new(server);
    let counters = server.counters.clone();
    let engine = Engine::with_handshaker(config(1), SharedServer(server.clone())).unwrap();
    let log = DiagnosticLog::default();

    let report = engine
        .scan(&endpoint(), &[V1, V2, V3, V4], &CapabilityProbe::versions(), &log)
        .await;

    assert_eq!(report.supported(), &[V1, V3, V4]);
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].capability, "TLS 1.1");
    assert!(entries[0].message.contains("timed out after 5s"), "{}", entries[0].message);
    assert_eq!(server.attempted_versions(), vec![V1, V2, V3, V4]);
    assert_eq!(counters.opened.load(Ordering::SeqCst), 3);
    assert_eq!(counters.released.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn session_stuck_in_close_is_still_released_on_timeout() {
    let mut server = FakeServer::speaking(vec![V3], vec![]);
    server.close_delay = Duration::from_secs(3600);
    let server = Arc::new(server);
    let counters = server.counters.clone();
    let engine = Engine::with_handshaker(config(1), SharedServer(server)).unwrap();
    let log = DiagnosticLog::default();

    let report = engine
        .scan(&endpoint(), &[V3], &CapabilityProbe::versions(), &log)
        .await;

    // Never judged supported: the close did not finish inside the bound.
    assert!(report.is_empty());
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("timed out after 5s"), "{}", entries[0].message);
    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 0);
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn supported_ciphers_renegotiate_when_pinned_directly() {
    let server_ciphers = vec![CipherSuite(0x0035), CipherSuite(0xc02f), CipherSuite(0xc030)];
    let server = Arc::new(FakeServer::speaking(vec![V3], server_ciphers));
    let engine = Engine::with_handshaker(config(1), SharedServer(server.clone())).unwrap();
    let log = DiagnosticLog::default();

    let candidates = registry::cipher_suites();
    let report = engine
        .scan(&endpoint(), candidates, &CapabilityProbe::ciphers(), &log)
        .await;

    // Secure suites come first in the table, so 0xc02f and 0xc030 precede 0x0035.
    assert_eq!(
        report.supported(),
        &[CipherSuite(0xc02f), CipherSuite(0xc030), CipherSuite(0x0035)]
    );
    assert!(log.entries().is_empty());

    for &suite in report.supported() {
        let mut session = server
            .negotiate(&endpoint(), &HandshakeConstraints::pinned_cipher(suite))
            .await
            .unwrap();
        assert_eq!(session.negotiated().cipher, Some(suite));
        assert_eq!(session.negotiated().version, Some(V3));
        session.close().await;
    }
}

#[tokio::test]
async fn cipher_probes_pin_tls12_and_a_single_suite() {
    let server = Arc::new(FakeServer::speaking(vec![V3], vec![]));
    let engine = Engine::with_handshaker(config(1), SharedServer(server.clone())).unwrap();
    let log = DiagnosticLog::default();

    engine
        .scan(
            &endpoint(),
            &[CipherSuite(0xc02f), CipherSuite(0x000a)],
            &CapabilityProbe::ciphers(),
            &log,
        )
        .await;

    let attempts = server.attempts.lock().unwrap();
    assert_eq!(attempts.len(), 2);
    for attempt in attempts.iter() {
        assert_eq!(attempt.min_version, V3);
        assert_eq!(attempt.max_version, V3);
        assert_eq!(attempt.cipher_suites.as_ref().map(Vec::len), Some(1));
        assert!(!attempt.verify_peer);
    }
}

#[tokio::test]
async fn run_reports_both_dimensions() {
    let server = FakeServer::speaking(vec![V2, V3], vec![CipherSuite(0xc02f)]);
    let engine = Engine::with_handshaker(config(2), server).unwrap();

    let report = engine.run(&endpoint()).await;

    assert_eq!(report.endpoint, endpoint());
    assert_eq!(report.versions.unwrap().supported(), &[V2, V3]);
    assert_eq!(report.ciphers.unwrap().supported(), &[CipherSuite(0xc02f)]);
    assert!(report.diagnostics.is_empty());
}

#[tokio::test]
async fn run_honours_selection() {
    let server = FakeServer::speaking(vec![V3], vec![CipherSuite(0xc02f)]);
    let mut cfg = config(1);
    cfg.selection = ScanSelection::Versions;
    let engine = Engine::with_handshaker(cfg, server).unwrap();

    let report = engine.run(&endpoint()).await;

    assert_eq!(report.versions.unwrap().supported(), &[V3]);
    assert!(report.ciphers.is_none());
}

/// Lets a test keep a handle on the fake after handing it to the engine.
struct SharedServer(Arc<FakeServer>);

#[async_trait]
impl Handshaker for SharedServer {
    async fn negotiate(
        &self,
        endpoint: &Endpoint,
        constraints: &HandshakeConstraints,
    ) -> Result<Box<dyn Session>, HandshakeError> {
        self.0.negotiate(endpoint, constraints).await
    }
}
