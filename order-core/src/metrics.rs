//! Prometheus metrics for the dual-write core
//!
//! # Metrics
//!
//! - `orders_dual_writes_total` - Dual writes committed, by event kind
//! - `orders_ledger_replays_total` - Appends answered from an existing ledger event
//! - `orders_ledger_failures_total` - Appends that failed or timed out
//! - `orders_reconciliation_required_total` - Ledger events left without a relational write
//! - `orders_append_duration_seconds` - Ledger append latency seen by the core

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Dual writes committed
    pub dual_writes: IntCounterVec,

    /// Idempotent replays
    pub ledger_replays: IntCounter,

    /// Ledger failures
    pub ledger_failures: IntCounter,

    /// Reconciliation-required conditions
    pub reconciliation_required: IntCounter,

    /// Append latency
    pub append_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("reconciliation_required", &self.reconciliation_required.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let dual_writes = IntCounterVec::new(
            Opts::new("orders_dual_writes_total", "Dual writes committed"),
            &["kind"],
        )?;
        registry.register(Box::new(dual_writes.clone()))?;

        let ledger_replays = IntCounter::new(
            "orders_ledger_replays_total",
            "Appends answered from an existing ledger event",
        )?;
        registry.register(Box::new(ledger_replays.clone()))?;

        let ledger_failures = IntCounter::new(
            "orders_ledger_failures_total",
            "Appends that failed or timed out",
        )?;
        registry.register(Box::new(ledger_failures.clone()))?;

        let reconciliation_required = IntCounter::new(
            "orders_reconciliation_required_total",
            "Ledger events left without a relational write",
        )?;
        registry.register(Box::new(reconciliation_required.clone()))?;

        let append_duration = Histogram::with_opts(
            HistogramOpts::new(
                "orders_append_duration_seconds",
                "Ledger append latency seen by the core",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0, 5.0]),
        )?;
        registry.register(Box::new(append_duration.clone()))?;

        Ok(Self {
            dual_writes,
            ledger_replays,
            ledger_failures,
            reconciliation_required,
            append_duration,
            registry,
        })
    }

    /// Record a committed dual write
    pub fn record_dual_write(&self, kind: &str) {
        self.dual_writes.with_label_values(&[kind]).inc();
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
        assert_eq!(metrics.reconciliation_required.get(), 0);
        assert_eq!(metrics.ledger_replays.get(), 0);
    }

    #[test]
    fn test_dual_writes_by_kind() {
        let metrics = Metrics::new().unwrap();
        metrics.record_dual_write("ORDER_CREATED");
        metrics.record_dual_write("ORDER_CREATED");
        metrics.record_dual_write("PAYMENT_RELEASED");

        assert_eq!(
            metrics.dual_writes.with_label_values(&["ORDER_CREATED"]).get(),
            2
        );
        assert_eq!(
            metrics.dual_writes.with_label_values(&["PAYMENT_RELEASED"]).get(),
            1
        );
    }
}
