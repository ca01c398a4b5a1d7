pub mod rate;

use crate::model::{CapabilityReport, Config, Endpoint, ScanReport};
use crate::output::diagnostics::{DiagnosticLog, Diagnostics};
use crate::probe::{
    registry, Capability, CapabilityProbe, Handshaker, OpensslConnector, ProbeError, ProbeOutcome,
};
use crate::util::{now_iso8601, now_millis};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use rate::RateLimiter;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Drives pinned handshakes across the capability tables of one endpoint.
pub struct Engine<H = OpensslConnector> {
    handshaker: H,
    limiter: RateLimiter,
    sem: Semaphore,
    cfg: Config,
}

impl Engine<OpensslConnector> {
    pub fn new(cfg: Config) -> anyhow::Result<Self> {
        let handshaker = OpensslConnector::from_config(&cfg);
        Self::with_handshaker(cfg, handshaker)
    }
}

impl<H: Handshaker> Engine<H> {
    pub fn with_handshaker(cfg: Config, handshaker: H) -> anyhow::Result<Self> {
        if cfg.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than zero");
        }
        if cfg.rate == 0 {
            anyhow::bail!("rate must be greater than zero");
        }

        Ok(Self {
            handshaker,
            limiter: RateLimiter::new(cfg.rate),
            sem: Semaphore::new(cfg.concurrency),
            cfg,
        })
    }

    /// Probes every selected dimension of `endpoint`. The version and cipher
    /// scans run side by side and share the concurrency budget.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn run(&self, endpoint: &Endpoint) -> ScanReport {
        let log = DiagnosticLog::default();
        let selection = self.cfg.selection;
        let timestamp = now_iso8601();

        let versions = async {
            if selection.versions() {
                Some(
                    self.scan(
                        endpoint,
                        registry::protocol_versions(),
                        &CapabilityProbe::versions(),
                        &log,
                    )
                    .await,
                )
            } else {
                None
            }
        };
        let ciphers = async {
            if selection.ciphers() {
                Some(
                    self.scan(
                        endpoint,
                        registry::cipher_suites(),
                        &CapabilityProbe::ciphers(),
                        &log,
                    )
                    .await,
                )
            } else {
                None
            }
        };
        let (versions, ciphers) = tokio::join!(versions, ciphers);

        ScanReport {
            endpoint: endpoint.clone(),
            timestamp,
            versions,
            ciphers,
            diagnostics: log.into_entries(),
        }
    }

    /// Probes each candidate and keeps the supported ones in their original
    /// order. Errors go to `diagnostics` and never stop the scan.
    pub async fn scan<C: Capability>(
        &self,
        endpoint: &Endpoint,
        candidates: &[C],
        probe: &CapabilityProbe<C>,
        diagnostics: &dyn Diagnostics,
    ) -> CapabilityReport<C> {
        let mut tasks = candidates
            .iter()
            .enumerate()
            .map(|(idx, &candidate)| async move {
                (idx, self.probe_one(endpoint, candidate, probe).await)
            })
            .collect::<FuturesUnordered<_>>();

        let mut outcomes: Vec<Option<ProbeOutcome>> = Vec::with_capacity(candidates.len());
        outcomes.resize_with(candidates.len(), || None);

        while let Some((idx, outcome)) = tasks.next().await {
            if let ProbeOutcome::Error(err) = &outcome {
                diagnostics.probe_failed(&candidates[idx].to_string(), err);
            }
            outcomes[idx] = Some(outcome);
        }

        candidates
            .iter()
            .zip(outcomes)
            .filter(|(_, outcome)| matches!(outcome, Some(ProbeOutcome::Supported)))
            .map(|(candidate, _)| *candidate)
            .collect()
    }

    async fn probe_one<C: Capability>(
        &self,
        endpoint: &Endpoint,
        candidate: C,
        probe: &CapabilityProbe<C>,
    ) -> ProbeOutcome {
        // The semaphore is never closed.
        let _permit = self.sem.acquire().await.ok();
        self.limiter.acquire().await;

        let start = now_millis();
        let probe_timeout = self.cfg.probe_timeout;
        let outcome = match timeout(
            probe_timeout,
            probe.probe(&self.handshaker, endpoint, candidate),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::Error(ProbeError::Timeout(probe_timeout)),
        };

        let ms = now_millis() - start;
        match &outcome {
            ProbeOutcome::Supported => debug!(%endpoint, capability = %candidate, ms, "supported"),
            ProbeOutcome::NotSupported => {
                debug!(%endpoint, capability = %candidate, ms, "not supported")
            }
            ProbeOutcome::Error(err) => warn!(
                %endpoint,
                kind = probe.kind(),
                capability = %candidate,
                ms,
                error = %err,
                "probe failed"
            ),
        }

        if self.cfg.concurrency > 1 {
            self.limiter.sleep_jitter().await;
        }
        outcome
    }
}
