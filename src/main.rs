use clap::Parser;
use tls_prober::cli::Cli;
use tls_prober::engine::Engine;
use tls_prober::output::OutputSink;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = cli.into_config()?;

    let endpoints = tls_prober::input::load_endpoints(&cfg).await?;
    if endpoints.is_empty() {
        anyhow::bail!("no valid targets to scan");
    }

    let mut sink = OutputSink::stdout(cfg.output.clone());
    let engine = Engine::new(cfg)?;
    for endpoint in &endpoints {
        let report = engine.run(endpoint).await;
        sink.write_report(&report)?;
    }

    Ok(())
}
