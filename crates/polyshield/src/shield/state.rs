//! Decision counters.

use super::Outcome;
use crate::log::MetricLogger;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Per-shield counters. Monotonic until reset.
#[derive(Clone, Debug, Default)]
pub struct ShieldState {
    shield_times: u64,
    agent_times: u64,
    backup_times: u64,
    total_time: Duration,
}

impl ShieldState {
    pub fn record(&mut self, outcome: Outcome, elapsed: Duration) {
        match outcome {
            Outcome::Agent => self.agent_times += 1,
            Outcome::Shielded => self.shield_times += 1,
            Outcome::Backup => {
                self.shield_times += 1;
                self.backup_times += 1;
            }
        }
        self.total_time += elapsed;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn report(&self) -> ShieldReport {
        ShieldReport {
            shield_times: self.shield_times,
            agent_times: self.agent_times,
            backup_times: self.backup_times,
            total_time: self.total_time.as_secs_f64(),
        }
    }
}

/// Snapshot of the counters.
///
/// `shield_times` counts every decision that replaced the proposal,
/// including the ones made by the backup controller (`backup_times`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShieldReport {
    pub shield_times: u64,
    pub agent_times: u64,
    pub backup_times: u64,
    /// Wall-clock seconds spent deciding
    pub total_time: f64,
}

impl ShieldReport {
    pub fn decisions(&self) -> u64 {
        self.shield_times + self.agent_times
    }

    /// Mean seconds per decision
    pub fn mean_time(&self) -> f64 {
        match self.decisions() {
            0 => 0.0,
            n => self.total_time / n as f64,
        }
    }

    /// Fraction of decisions where the proposal was replaced
    pub fn intervention_rate(&self) -> f64 {
        match self.decisions() {
            0 => 0.0,
            n => self.shield_times as f64 / n as f64,
        }
    }

    /// Publish the counters under the `shield/` prefix.
    pub fn log_to(&self, logger: &dyn MetricLogger, step: u64) {
        let mut metrics = HashMap::new();
        metrics.insert("shield/shielded".to_string(), self.shield_times as f64);
        metrics.insert("shield/agent".to_string(), self.agent_times as f64);
        metrics.insert("shield/backup".to_string(), self.backup_times as f64);
        metrics.insert("shield/mean_time".to_string(), self.mean_time());
        logger.log_metrics(&metrics, step);
    }
}
