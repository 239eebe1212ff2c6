//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_events_total` - Total number of events appended
//! - `ledger_rejected_total` - Submissions rejected before sealing
//! - `ledger_events_batch_size` - Histogram of batch sizes
//! - `ledger_append_duration_seconds` - Histogram of append latencies
//! - `ledger_head_offset` - Offset of the newest durable event

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Total events appended
    pub events_total: IntCounter,

    /// Submissions rejected by validation
    pub rejected_total: IntCounter,

    /// Batch size histogram
    pub batch_size: Histogram,

    /// Append duration histogram
    pub append_duration: Histogram,

    /// Newest durable offset
    pub head_offset: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("events_total", &self.events_total.get())
            .field("head_offset", &self.head_offset.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let events_total =
            IntCounter::new("ledger_events_total", "Total number of events appended")?;
        registry.register(Box::new(events_total.clone()))?;

        let rejected_total = IntCounter::new(
            "ledger_rejected_total",
            "Submissions rejected before sealing",
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let batch_size = Histogram::with_opts(
            HistogramOpts::new("ledger_events_batch_size", "Histogram of batch sizes")
                .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
        )?;
        registry.register(Box::new(batch_size.clone()))?;

        let append_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_append_duration_seconds",
                "Histogram of append latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(append_duration.clone()))?;

        let head_offset =
            IntGauge::new("ledger_head_offset", "Offset of the newest durable event")?;
        registry.register(Box::new(head_offset.clone()))?;

        Ok(Self {
            events_total,
            rejected_total,
            batch_size,
            append_duration,
            head_offset,
            registry,
        })
    }

    /// Record event append
    pub fn record_event_append(&self, offset: u64) {
        self.events_total.inc();
        self.head_offset.set(offset as i64);
    }

    /// Record rejected submission
    pub fn record_rejection(&self) {
        self.rejected_total.inc();
    }

    /// Record batch flush
    pub fn record_batch_flush(&self, batch_size: usize) {
        self.batch_size.observe(batch_size as f64);
    }

    /// Record append duration
    pub fn record_append_duration(&self, duration_seconds: f64) {
        self.append_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.events_total.get(), 0);
        assert_eq!(metrics.rejected_total.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        // Two collectors in one process must not collide
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_event_append(3);
        assert_eq!(a.events_total.get(), 1);
        assert_eq!(b.events_total.get(), 0);
    }

    #[test]
    fn test_record_event_append() {
        let metrics = Metrics::new().unwrap();
        metrics.record_event_append(0);
        metrics.record_event_append(1);
        assert_eq!(metrics.events_total.get(), 2);
        assert_eq!(metrics.head_offset.get(), 1);
    }

    #[test]
    fn test_registry_exports_families() {
        let metrics = Metrics::new().unwrap();
        metrics.record_batch_flush(10);
        metrics.record_rejection();

        let names: Vec<String> = metrics
            .registry()
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"ledger_events_batch_size".to_string()));
        assert!(names.contains(&"ledger_rejected_total".to_string()));
    }
}
