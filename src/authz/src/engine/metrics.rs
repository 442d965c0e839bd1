//! Decision metrics

use parking_lot::RwLock;
use std::time::Duration;

use crate::error::AuthzError;

/// Engine counters
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Total number of authorisation requests
    pub total_requests: u64,

    /// Requests answered with at least one granting role
    pub granted_decisions: u64,

    /// Requests answered with no granting role
    pub denied_decisions: u64,

    /// Requests rejected for a blank action or user
    pub validation_errors: u64,

    /// Requests that hit a rule configuration inconsistency
    pub config_errors: u64,

    /// Requests with an invalid or unknown target entity
    pub graph_errors: u64,

    /// Requests that failed reading or parsing input
    pub io_errors: u64,

    /// Average latency over all requests
    pub avg_latency_us: f64,
}

impl EngineMetrics {
    /// Share of successful decisions that granted the action
    pub fn grant_rate(&self) -> f64 {
        let total = self.granted_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.granted_decisions as f64 / total as f64
        }
    }

    pub fn error_count(&self) -> u64 {
        self.validation_errors + self.config_errors + self.graph_errors + self.io_errors
    }
}

/// Thread-safe metrics collector
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: RwLock<EngineMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decision(&self, granted: bool, latency: Duration) {
        let mut metrics = self.metrics.write();
        Self::record_latency(&mut metrics, latency);
        if granted {
            metrics.granted_decisions += 1;
        } else {
            metrics.denied_decisions += 1;
        }
    }

    pub fn record_error(&self, error: &AuthzError, latency: Duration) {
        let mut metrics = self.metrics.write();
        Self::record_latency(&mut metrics, latency);
        match error {
            AuthzError::Validation(_) => metrics.validation_errors += 1,
            AuthzError::Config(_) => metrics.config_errors += 1,
            AuthzError::Graph(_) => metrics.graph_errors += 1,
            AuthzError::Parse(_) | AuthzError::Io(_) => metrics.io_errors += 1,
        }
    }

    pub fn get_metrics(&self) -> EngineMetrics {
        self.metrics.read().clone()
    }

    pub fn reset(&self) {
        *self.metrics.write() = EngineMetrics::default();
    }

    fn record_latency(metrics: &mut EngineMetrics, latency: Duration) {
        let sample = latency.as_secs_f64() * 1_000_000.0;
        metrics.total_requests += 1;
        let n = metrics.total_requests as f64;
        metrics.avg_latency_us += (sample - metrics.avg_latency_us) / n;
    }
}
