use crate::model::{Config, Endpoint, OutputConfig, OutputFormat, ScanSelection};
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Probe which TLS versions and TLS 1.2 cipher suites a server negotiates",
    long_about = None
)]
pub struct Cli {
    /// Single host to probe
    #[arg(short = 'H', long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Port of the single host
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// File containing host:port targets (one per line)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<String>,

    /// Handshakes allowed in flight at once (1 probes strictly in order)
    #[arg(long = "concurrency", default_value_t = 1)]
    pub concurrency: usize,

    /// New handshakes per second (token bucket fill rate)
    #[arg(long = "rate", default_value_t = 64)]
    pub rate: u32,

    /// TCP connect timeout in milliseconds
    #[arg(long = "connect-timeout", default_value_t = 3000)]
    pub connect_timeout_ms: u64,

    /// TLS handshake timeout in milliseconds
    #[arg(long = "handshake-timeout", default_value_t = 5000)]
    pub handshake_timeout_ms: u64,

    /// Overall timeout per probe in milliseconds; must cover connect and
    /// handshake timeouts together
    #[arg(long = "probe-timeout", default_value_t = 15000)]
    pub probe_timeout_ms: u64,

    /// Capability dimensions to probe
    #[arg(long = "scan", default_value_t = ScanSelection::All)]
    pub scan: ScanSelection,

    /// Output format
    #[arg(long = "output", default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,
}

impl Cli {
    pub fn into_config(self) -> anyhow::Result<Config> {
        if self.host.is_none() && self.input.is_none() {
            anyhow::bail!("either --host/--port or --input is required");
        }

        if self.host.is_some() && self.input.is_some() {
            anyhow::bail!("--host/--port and --input are mutually exclusive");
        }

        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than zero");
        }

        if self.rate == 0 {
            anyhow::bail!("rate must be greater than zero");
        }

        let stages_ms = self
            .connect_timeout_ms
            .saturating_add(self.handshake_timeout_ms);
        if self.probe_timeout_ms < stages_ms {
            anyhow::bail!(
                "probe-timeout ({}ms) must be at least connect-timeout + handshake-timeout ({}ms)",
                self.probe_timeout_ms,
                stages_ms
            );
        }

        let target = match (self.host, self.port) {
            (Some(host), Some(port)) => Some(Endpoint::new(host, port)),
            (None, None) => None,
            _ => anyhow::bail!("--host and --port must be used together"),
        };

        Ok(Config {
            target,
            input: self.input,
            concurrency: self.concurrency,
            rate: self.rate,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            selection: self.scan,
            output: OutputConfig {
                format: self.output,
            },
        })
    }
}
