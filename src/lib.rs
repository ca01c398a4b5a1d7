//! Active TLS capability prober.
//!
//! Every candidate protocol version and TLS 1.2 cipher suite is tested with
//! its own handshake pinned to exactly that value, and the outcomes are
//! folded into ordered reports of what the server accepted.

#[cfg(feature = "cli")]
pub mod cli;
pub mod engine;
pub mod input;
pub mod model;
pub mod output;
pub mod probe;
pub mod util;
