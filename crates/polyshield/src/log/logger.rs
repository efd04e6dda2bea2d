//! Metric logger trait and combinators.

use std::collections::HashMap;

/// Sink for scalar metrics keyed by name and step.
pub trait MetricLogger: Send + Sync {
    fn log_scalar(&self, name: &str, value: f64, step: u64);

    /// Log several metrics sharing a step.
    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        for (name, value) in metrics {
            self.log_scalar(name, *value, step);
        }
    }

    /// Flush pending writes.
    fn close(&self) {}
}

/// Discards everything.
pub struct NoOpLogger;

impl MetricLogger for NoOpLogger {
    fn log_scalar(&self, _name: &str, _value: f64, _step: u64) {}
    fn log_metrics(&self, _metrics: &HashMap<String, f64>, _step: u64) {}
}

/// Forwards every metric to each inner logger.
#[derive(Default)]
pub struct CompositeLogger {
    loggers: Vec<Box<dyn MetricLogger>>,
}

impl CompositeLogger {
    pub fn new(loggers: Vec<Box<dyn MetricLogger>>) -> Self {
        Self { loggers }
    }

    pub fn add(&mut self, logger: Box<dyn MetricLogger>) {
        self.loggers.push(logger);
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricLogger for CompositeLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        for logger in &self.loggers {
            logger.log_scalar(name, value, step);
        }
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        for logger in &self.loggers {
            logger.log_metrics(metrics, step);
        }
    }

    fn close(&self) {
        for logger in &self.loggers {
            logger.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLogger;
    use std::sync::Arc;

    struct Shared(Arc<MemoryLogger>);

    impl MetricLogger for Shared {
        fn log_scalar(&self, name: &str, value: f64, step: u64) {
            self.0.log_scalar(name, value, step);
        }
    }

    #[test]
    fn test_composite_fans_out() {
        let first = Arc::new(MemoryLogger::new());
        let second = Arc::new(MemoryLogger::new());
        let mut composite = CompositeLogger::new(vec![Box::new(Shared(first.clone()))]);
        composite.add(Box::new(Shared(second.clone())));
        composite.add(Box::new(NoOpLogger));
        assert_eq!(composite.len(), 3);

        let mut metrics = HashMap::new();
        metrics.insert("shield/agent".to_string(), 4.0);
        composite.log_metrics(&metrics, 1);
        composite.log_scalar("shield/backup", 2.0, 2);

        for sink in [&first, &second] {
            assert_eq!(sink.last("shield/agent"), Some((1, 4.0)));
            assert_eq!(sink.last("shield/backup"), Some((2, 2.0)));
        }
    }
}
