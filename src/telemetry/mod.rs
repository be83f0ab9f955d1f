//! Telemetry
//!
//! Observability components for the authenticated request layer.
//!
//! Logging goes through `tracing` directly; this module carries the metrics
//! hooks and the session event stream.

pub mod events;
pub mod metrics;

// Events
pub use events::{SessionEvent, SessionEventBus, DEFAULT_EVENT_CAPACITY};

// Metrics
pub use metrics::{
    create_in_memory_metrics, no_op_metrics, AuthMetrics, InMemoryMetrics, MetricEntry,
    MetricLabels, NoOpMetrics,
};
