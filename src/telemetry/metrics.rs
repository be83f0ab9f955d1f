//! Metrics
//!
//! Metrics hooks for the authenticated request layer.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::core::HttpMethod;

/// Metric labels.
pub type MetricLabels = HashMap<String, String>;

/// Auth metrics interface.
pub trait AuthMetrics: Send + Sync {
    /// Record a completed backend request.
    fn record_request(&self, method: HttpMethod, status: Option<u16>, duration_ms: f64);

    /// Record a refresh exchange being started.
    fn record_refresh_attempt(&self, attempt: u32);

    /// Record the outcome of a refresh exchange.
    fn record_refresh(&self, success: bool);

    /// Record a call parked behind an in-flight refresh.
    fn record_queued_call(&self);

    /// Record a forced logout.
    fn record_forced_logout(&self, reason: &str);

    /// Record an error surfaced to a caller.
    fn record_error(&self, error_code: &str);
}

/// No-op metrics implementation.
pub struct NoOpMetrics;

impl AuthMetrics for NoOpMetrics {
    fn record_request(&self, _method: HttpMethod, _status: Option<u16>, _duration_ms: f64) {}
    fn record_refresh_attempt(&self, _attempt: u32) {}
    fn record_refresh(&self, _success: bool) {}
    fn record_queued_call(&self) {}
    fn record_forced_logout(&self, _reason: &str) {}
    fn record_error(&self, _error_code: &str) {}
}

/// No-op metrics singleton.
pub fn no_op_metrics() -> NoOpMetrics {
    NoOpMetrics
}

/// Metric entry for in-memory storage.
#[derive(Debug, Clone)]
pub struct MetricEntry {
    pub name: String,
    pub value: f64,
    pub labels: MetricLabels,
    pub timestamp: u64,
}

/// In-memory metrics for testing.
pub struct InMemoryMetrics {
    entries: Mutex<Vec<MetricEntry>>,
}

impl InMemoryMetrics {
    /// Create new in-memory metrics.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Get all recorded entries.
    pub fn get_entries(&self) -> Vec<MetricEntry> {
        self.entries.lock().clone()
    }

    /// Get entries by name.
    pub fn get_entries_by_name(&self, name: &str) -> Vec<MetricEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Number of entries recorded under `name`.
    pub fn count(&self, name: &str) -> usize {
        self.entries.lock().iter().filter(|e| e.name == name).count()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn record(&self, name: &str, value: f64, labels: MetricLabels) {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;

        self.entries.lock().push(MetricEntry {
            name: name.to_string(),
            value,
            labels,
            timestamp: now,
        });
    }
}

impl Default for InMemoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthMetrics for InMemoryMetrics {
    fn record_request(&self, method: HttpMethod, status: Option<u16>, duration_ms: f64) {
        let mut labels = MetricLabels::new();
        labels.insert("method".to_string(), method.as_str().to_string());
        labels.insert(
            "status".to_string(),
            status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()),
        );
        self.record("auth_request_duration_ms", duration_ms, labels);
    }

    fn record_refresh_attempt(&self, attempt: u32) {
        let mut labels = MetricLabels::new();
        labels.insert("attempt".to_string(), attempt.to_string());
        self.record("auth_refresh_attempts_total", 1.0, labels);
    }

    fn record_refresh(&self, success: bool) {
        let mut labels = MetricLabels::new();
        labels.insert("success".to_string(), success.to_string());
        self.record("auth_refreshes_total", 1.0, labels);
    }

    fn record_queued_call(&self) {
        self.record("auth_queued_calls_total", 1.0, MetricLabels::new());
    }

    fn record_forced_logout(&self, reason: &str) {
        let mut labels = MetricLabels::new();
        labels.insert("reason".to_string(), reason.to_string());
        self.record("auth_forced_logouts_total", 1.0, labels);
    }

    fn record_error(&self, error_code: &str) {
        let mut labels = MetricLabels::new();
        labels.insert("error_code".to_string(), error_code.to_string());
        self.record("auth_errors_total", 1.0, labels);
    }
}

/// Create in-memory metrics for testing.
pub fn create_in_memory_metrics() -> InMemoryMetrics {
    InMemoryMetrics::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_op_metrics() {
        let metrics = no_op_metrics();
        // Should not panic
        metrics.record_refresh_attempt(1);
        metrics.record_forced_logout("refresh_rejected");
    }

    #[test]
    fn test_in_memory_metrics() {
        let metrics = InMemoryMetrics::new();

        metrics.record_refresh_attempt(1);
        metrics.record_refresh(false);
        metrics.record_request(HttpMethod::Get, Some(401), 12.5);

        assert_eq!(metrics.get_entries().len(), 3);
        assert_eq!(metrics.count("auth_refresh_attempts_total"), 1);

        let requests = metrics.get_entries_by_name("auth_request_duration_ms");
        assert_eq!(requests[0].labels.get("status"), Some(&"401".to_string()));
        assert_eq!(requests[0].labels.get("method"), Some(&"GET".to_string()));
    }

    #[test]
    fn test_clear_entries() {
        let metrics = InMemoryMetrics::new();
        metrics.record_queued_call();

        assert!(!metrics.get_entries().is_empty());
        metrics.clear();
        assert!(metrics.get_entries().is_empty());
    }
}
