mod capability;
mod connector;
pub mod registry;
mod tls;

pub use capability::{
    cipher_absent, version_absent, Capability, CapabilityProbe, ProbeError, ProbeOutcome,
};
pub use connector::OpensslConnector;
pub use tls::{Alert, HandshakeConstraints, HandshakeError, Handshaker, Negotiated, Session};
