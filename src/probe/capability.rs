use super::tls::{Alert, HandshakeConstraints, HandshakeError, Handshaker, Negotiated};
use crate::model::{CipherSuite, Endpoint, ProtocolVersion};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Result of one pinned handshake.
#[derive(Debug)]
pub enum ProbeOutcome {
    Supported,
    NotSupported,
    Error(ProbeError),
}

impl ProbeOutcome {
    pub fn is_supported(&self) -> bool {
        matches!(self, ProbeOutcome::Supported)
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// The handshake completed outside the pinned value.
    #[error("negotiated unexpected {kind} {negotiated}, expected {kind} {expected}")]
    UnexpectedNegotiation {
        kind: &'static str,
        expected: String,
        negotiated: String,
    },

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

/// A probeable value in one of the two capability namespaces.
pub trait Capability: Copy + Eq + fmt::Display + Send + Sync + 'static {}

impl Capability for ProtocolVersion {}
impl Capability for CipherSuite {}

/// Turns a general-purpose handshake into a test of exactly one capability.
///
/// The constraint builder pins the candidate, the extractor reads the
/// negotiated value back, and the absence check decides which handshake
/// failures mean "server does not support this" rather than "something went
/// wrong".
pub struct CapabilityProbe<C> {
    kind: &'static str,
    constrain: fn(C) -> HandshakeConstraints,
    negotiated: fn(&Negotiated) -> Option<C>,
    is_absent: fn(&HandshakeError) -> bool,
}

impl<C> Clone for CapabilityProbe<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for CapabilityProbe<C> {}

impl CapabilityProbe<ProtocolVersion> {
    pub fn versions() -> Self {
        Self {
            kind: "TLS version",
            constrain: HandshakeConstraints::pinned_version,
            negotiated: |negotiated| negotiated.version,
            is_absent: version_absent,
        }
    }
}

impl CapabilityProbe<CipherSuite> {
    pub fn ciphers() -> Self {
        Self {
            kind: "cipher suite",
            constrain: HandshakeConstraints::pinned_cipher,
            negotiated: |negotiated| negotiated.cipher,
            is_absent: cipher_absent,
        }
    }
}

impl<C: Capability> CapabilityProbe<C> {
    /// Replaces the rule deciding which failures mean "not supported".
    pub fn with_absence_check(mut self, is_absent: fn(&HandshakeError) -> bool) -> Self {
        self.is_absent = is_absent;
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn constraints(&self, candidate: C) -> HandshakeConstraints {
        (self.constrain)(candidate)
    }

    pub async fn probe(
        &self,
        handshaker: &dyn Handshaker,
        endpoint: &Endpoint,
        candidate: C,
    ) -> ProbeOutcome {
        let constraints = self.constraints(candidate);
        let mut session = match handshaker.negotiate(endpoint, &constraints).await {
            Ok(session) => session,
            Err(err) if (self.is_absent)(&err) => {
                debug!(%endpoint, capability = %candidate, reason = %err, "capability absent");
                return ProbeOutcome::NotSupported;
            }
            Err(err) => return ProbeOutcome::Error(err.into()),
        };

        let negotiated = session.negotiated();
        session.close().await;
        drop(session);

        match (self.negotiated)(&negotiated) {
            Some(value) if value == candidate => ProbeOutcome::Supported,
            other => ProbeOutcome::Error(ProbeError::UnexpectedNegotiation {
                kind: self.kind,
                expected: candidate.to_string(),
                negotiated: other
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "unknown".into()),
            }),
        }
    }
}

/// The pinned version was refused locally or by the server.
pub fn version_absent(err: &HandshakeError) -> bool {
    matches!(
        err,
        HandshakeError::NoMutualVersion(_) | HandshakeError::Alert(Alert::ProtocolVersion)
    )
}

/// The server rejected the only suite on offer.
pub fn cipher_absent(err: &HandshakeError) -> bool {
    matches!(err, HandshakeError::Alert(Alert::HandshakeFailure))
}
