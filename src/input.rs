use crate::model::{Config, Endpoint};
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Collects the endpoints to scan: either the single `--host/--port` target
/// or every valid line of the input file.
pub async fn load_endpoints(cfg: &Config) -> anyhow::Result<Vec<Endpoint>> {
    let mut endpoints = Vec::new();

    if let Some(endpoint) = cfg.target.clone() {
        endpoints.push(endpoint);
    }

    if let Some(path) = cfg.input.as_deref() {
        endpoints.extend(read_file(path).await?);
    }

    Ok(endpoints)
}

async fn read_file(path: &str) -> anyhow::Result<Vec<Endpoint>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("cannot open input {}", path))?;
    let mut reader = BufReader::new(file).lines();
    let mut endpoints = Vec::new();
    while let Some(line) = reader.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_target(trimmed) {
            Some(endpoint) => endpoints.push(endpoint),
            None => tracing::warn!(line = %trimmed, "skipping invalid target"),
        }
    }
    Ok(endpoints)
}

/// Parses `host:port`, accepting bracketed IPv6 literals.
pub fn parse_target(line: &str) -> Option<Endpoint> {
    let (host_part, port_part) = line.rsplit_once(':')?;
    let host = host_part
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    if host.is_empty() {
        return None;
    }
    let port: u16 = port_part.trim().parse().ok()?;
    Some(Endpoint::new(host, port))
}
