use crate::model::Diagnostic;
use crate::probe::ProbeError;
use std::sync::{Mutex, PoisonError};

/// Receives every probe that ended in an error. Implementations may be
/// called from concurrently running probes.
pub trait Diagnostics: Send + Sync {
    fn probe_failed(&self, capability: &str, error: &ProbeError);
}

/// Collects diagnostics for one scan in arrival order.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticLog {
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Diagnostics for DiagnosticLog {
    fn probe_failed(&self, capability: &str, error: &ProbeError) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Diagnostic {
                capability: capability.to_string(),
                message: error.to_string(),
            });
    }
}
