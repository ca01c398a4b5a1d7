#[cfg(feature = "cli")]
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Server under test. Hosts may be DNS names or IP literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub target: Option<Endpoint>,
    pub input: Option<String>,
    pub concurrency: usize,
    pub rate: u32,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    pub probe_timeout: Duration,
    pub selection: ScanSelection,
    pub output: OutputConfig,
}

/// Which capability dimensions to probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ScanSelection {
    Versions,
    Ciphers,
    All,
}

impl ScanSelection {
    pub fn versions(self) -> bool {
        matches!(self, ScanSelection::Versions | ScanSelection::All)
    }

    pub fn ciphers(self) -> bool {
        matches!(self, ScanSelection::Ciphers | ScanSelection::All)
    }
}

impl fmt::Display for ScanSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanSelection::Versions => write!(f, "versions"),
            ScanSelection::Ciphers => write!(f, "ciphers"),
            ScanSelection::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
pub enum OutputFormat {
    Jsonl,
    Pretty,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jsonl => write!(f, "jsonl"),
            OutputFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// TLS protocol version code as carried on the wire (e.g. `0x0303`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    pub const TLS1_0: ProtocolVersion = ProtocolVersion(0x0301);
    pub const TLS1_1: ProtocolVersion = ProtocolVersion(0x0302);
    pub const TLS1_2: ProtocolVersion = ProtocolVersion(0x0303);
    pub const TLS1_3: ProtocolVersion = ProtocolVersion(0x0304);

    pub fn name(self) -> Option<&'static str> {
        match self {
            ProtocolVersion::TLS1_0 => Some("TLS 1.0"),
            ProtocolVersion::TLS1_1 => Some("TLS 1.1"),
            ProtocolVersion::TLS1_2 => Some("TLS 1.2"),
            ProtocolVersion::TLS1_3 => Some("TLS 1.3"),
            ProtocolVersion(0x0300) => Some("SSL 3.0"),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}

/// IANA cipher suite code (e.g. `0xC02F`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    pub fn name(self) -> Option<&'static str> {
        crate::probe::registry::suite_info(self).map(|info| info.name)
    }

    /// Legacy suites are probed on purpose; the flag only affects reporting.
    pub fn is_insecure(self) -> bool {
        crate::probe::registry::suite_info(self)
            .map(|info| info.insecure)
            .unwrap_or(false)
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}

/// Capabilities judged supported, in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityReport<C> {
    supported: Vec<C>,
}

impl<C> CapabilityReport<C> {
    pub fn supported(&self) -> &[C] {
        &self.supported
    }

    pub fn is_empty(&self) -> bool {
        self.supported.is_empty()
    }
}

impl<C> Default for CapabilityReport<C> {
    fn default() -> Self {
        Self {
            supported: Vec::new(),
        }
    }
}

impl<C> FromIterator<C> for CapabilityReport<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Self {
            supported: iter.into_iter().collect(),
        }
    }
}

/// A probe that ended in `Error`, attributed to its candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub capability: String,
    pub message: String,
}

/// Everything learned about one endpoint.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub endpoint: Endpoint,
    pub timestamp: String,
    pub versions: Option<CapabilityReport<ProtocolVersion>>,
    pub ciphers: Option<CapabilityReport<CipherSuite>>,
    pub diagnostics: Vec<Diagnostic>,
}
