//! In-memory metric backend.

use super::MetricLogger;
use std::collections::HashMap;
use std::sync::Mutex;

/// Records every metric as a `(step, value)` series. Useful in tests and for
/// post-hoc summaries.
#[derive(Default)]
pub struct MemoryLogger {
    series: Mutex<HashMap<String, Vec<(u64, f64)>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full history of one metric.
    pub fn series(&self, name: &str) -> Vec<(u64, f64)> {
        self.series
            .lock()
            .map(|s| s.get(name).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Most recent `(step, value)` of one metric.
    pub fn last(&self, name: &str) -> Option<(u64, f64)> {
        self.series.lock().ok()?.get(name)?.last().copied()
    }

    /// Names of all recorded metrics, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .series
            .lock()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl MetricLogger for MemoryLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        if let Ok(mut series) = self.series.lock() {
            series.entry(name.to_string()).or_default().push((step, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_series() {
        let logger = MemoryLogger::new();
        logger.log_scalar("b", 1.0, 0);
        logger.log_scalar("a", 2.0, 1);
        logger.log_scalar("a", 3.0, 2);

        assert_eq!(logger.series("a"), vec![(1, 2.0), (2, 3.0)]);
        assert_eq!(logger.last("a"), Some((2, 3.0)));
        assert_eq!(logger.last("missing"), None);
        assert_eq!(logger.names(), vec!["a".to_string(), "b".to_string()]);
    }
}
