//! Console metric backend.

use super::MetricLogger;
use std::collections::HashMap;

/// Emits metrics as `tracing` info events, one line per step.
#[derive(Default)]
pub struct ConsoleLogger;

impl ConsoleLogger {
    pub fn new() -> Self {
        Self
    }
}

impl MetricLogger for ConsoleLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        tracing::info!(step, "{} = {:.4}", name, value);
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        let mut entries: Vec<_> = metrics.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let line = entries
            .iter()
            .map(|(name, value)| format!("{name}={value:.4}"))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(step, "{}", line);
    }
}
