//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the stock ledger:
//!
//! - `stock_postings_total` - vouchers posted successfully
//! - `stock_postings_rejected_total` - postings rejected (validation or shortfall)
//! - `stock_transactions_total` - ledger entries appended
//! - `stock_tracking_closed_total` - tracking numbers closed by final vouchers
//! - `stock_valuation_duration_seconds` - valuation query latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Vouchers posted successfully
    pub postings_total: IntCounter,

    /// Postings rejected before anything persisted
    pub postings_rejected_total: IntCounter,

    /// Ledger entries appended
    pub transactions_total: IntCounter,

    /// Tracking numbers closed
    pub tracking_closed_total: IntCounter,

    /// Valuation query latency
    pub valuation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let postings_total =
            IntCounter::new("stock_postings_total", "Vouchers posted successfully")?;
        registry.register(Box::new(postings_total.clone()))?;

        let postings_rejected_total = IntCounter::new(
            "stock_postings_rejected_total",
            "Postings rejected before anything persisted",
        )?;
        registry.register(Box::new(postings_rejected_total.clone()))?;

        let transactions_total =
            IntCounter::new("stock_transactions_total", "Ledger entries appended")?;
        registry.register(Box::new(transactions_total.clone()))?;

        let tracking_closed_total = IntCounter::new(
            "stock_tracking_closed_total",
            "Tracking numbers closed by final vouchers",
        )?;
        registry.register(Box::new(tracking_closed_total.clone()))?;

        let valuation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "stock_valuation_duration_seconds",
                "Valuation query latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(valuation_duration.clone()))?;

        Ok(Self {
            postings_total,
            postings_rejected_total,
            transactions_total,
            tracking_closed_total,
            valuation_duration,
            registry,
        })
    }

    /// Record a successful posting and its appended entry count
    pub fn record_posting(&self, appended: usize) {
        self.postings_total.inc();
        self.transactions_total.inc_by(appended as u64);
    }

    /// Record a rejected posting
    pub fn record_rejection(&self) {
        self.postings_rejected_total.inc();
    }

    /// Record a tracking close
    pub fn record_tracking_closed(&self) {
        self.tracking_closed_total.inc();
    }

    /// Record a valuation query duration
    pub fn record_valuation_duration(&self, duration_seconds: f64) {
        self.valuation_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("postings_total", &self.postings_total.get())
            .field("transactions_total", &self.transactions_total.get())
            .finish()
    }
}
