pub mod diagnostics;

use crate::model::{
    CapabilityReport, CipherSuite, Diagnostic, OutputConfig, OutputFormat, ProtocolVersion,
    ScanReport,
};
use serde::Serialize;
use std::io::{BufWriter, Stdout, Write};

/// Renders scan reports as pretty text or one JSON object per line.
pub struct OutputSink<W: Write = BufWriter<Stdout>> {
    cfg: OutputConfig,
    writer: W,
}

#[derive(Serialize)]
struct ReportView<'a> {
    endpoint: String,
    host: &'a str,
    port: u16,
    timestamp: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    versions: Option<Vec<CapabilityView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ciphers: Option<Vec<CapabilityView>>,
    errors: &'a [Diagnostic],
}

#[derive(Serialize)]
struct CapabilityView {
    id: String,
    name: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    insecure: bool,
}

impl From<&ProtocolVersion> for CapabilityView {
    fn from(version: &ProtocolVersion) -> Self {
        CapabilityView {
            id: format!("0x{:04X}", version.0),
            name: version.to_string(),
            insecure: false,
        }
    }
}

impl From<&CipherSuite> for CapabilityView {
    fn from(suite: &CipherSuite) -> Self {
        CapabilityView {
            id: format!("0x{:04X}", suite.0),
            name: suite.to_string(),
            insecure: suite.is_insecure(),
        }
    }
}

fn views<'a, C: 'a>(report: &'a CapabilityReport<C>) -> Vec<CapabilityView>
where
    CapabilityView: From<&'a C>,
{
    report.supported().iter().map(CapabilityView::from).collect()
}

impl OutputSink {
    pub fn stdout(cfg: OutputConfig) -> Self {
        Self::with_writer(cfg, BufWriter::new(std::io::stdout()))
    }
}

impl<W: Write> OutputSink<W> {
    pub fn with_writer(cfg: OutputConfig, writer: W) -> Self {
        Self { cfg, writer }
    }

    pub fn write_report(&mut self, report: &ScanReport) -> anyhow::Result<()> {
        match self.cfg.format {
            OutputFormat::Jsonl => {
                let view = ReportView {
                    endpoint: report.endpoint.to_string(),
                    host: &report.endpoint.host,
                    port: report.endpoint.port,
                    timestamp: &report.timestamp,
                    versions: report.versions.as_ref().map(views),
                    ciphers: report.ciphers.as_ref().map(views),
                    errors: &report.diagnostics,
                };
                let line = serde_json::to_string(&view)?;
                writeln!(self.writer, "{line}")?;
            }
            OutputFormat::Pretty => self.write_pretty(report)?,
        }
        self.writer.flush()?;
        Ok(())
    }

    fn write_pretty(&mut self, report: &ScanReport) -> anyhow::Result<()> {
        writeln!(self.writer, "{} ({})", report.endpoint, report.timestamp)?;
        if let Some(versions) = &report.versions {
            writeln!(self.writer, "  Supported TLS versions:")?;
            self.write_list(versions.supported().iter().map(|v| v.to_string()))?;
        }
        if let Some(ciphers) = &report.ciphers {
            writeln!(self.writer, "  Supported TLS 1.2 cipher suites:")?;
            self.write_list(ciphers.supported().iter().map(|suite| {
                if suite.is_insecure() {
                    format!("{suite} (insecure)")
                } else {
                    suite.to_string()
                }
            }))?;
        }
        if !report.diagnostics.is_empty() {
            writeln!(self.writer, "  Errors:")?;
            for diag in &report.diagnostics {
                writeln!(self.writer, "  - [{}] {}", diag.capability, diag.message)?;
            }
        }
        Ok(())
    }

    fn write_list(&mut self, items: impl Iterator<Item = String>) -> anyhow::Result<()> {
        let mut empty = true;
        for item in items {
            empty = false;
            writeln!(self.writer, "  - {item}")?;
        }
        if empty {
            writeln!(self.writer, "  (none)")?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
