//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `canteen_orders_total` - Orders appended to the ledger
//! - `canteen_claims_total` - Payment claims enqueued
//! - `canteen_payments_confirmed_total` - Claims confirmed into the ledger
//! - `canteen_stale_confirmations_total` - Confirmations lost to a concurrent winner
//! - `canteen_reconcile_failures_total` - Fatal post-removal append failures
//! - `canteen_balance_query_duration_seconds` - Balance computation latency

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry, Histogram, IntCounter,
    Registry,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Orders appended
    pub orders_total: IntCounter,

    /// Claims enqueued
    pub claims_total: IntCounter,

    /// Claims confirmed into the ledger
    pub payments_confirmed_total: IntCounter,

    /// Confirmations that lost the race for a claim
    pub stale_confirmations_total: IntCounter,

    /// Fatal reconciliation failures (manual intervention required)
    pub reconcile_failures_total: IntCounter,

    /// Balance computation latency
    pub balance_query_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let orders_total = register_int_counter_with_registry!(
            "canteen_orders_total",
            "Orders appended to the ledger",
            registry
        )?;

        let claims_total = register_int_counter_with_registry!(
            "canteen_claims_total",
            "Payment claims enqueued",
            registry
        )?;

        let payments_confirmed_total = register_int_counter_with_registry!(
            "canteen_payments_confirmed_total",
            "Claims confirmed into the ledger",
            registry
        )?;

        let stale_confirmations_total = register_int_counter_with_registry!(
            "canteen_stale_confirmations_total",
            "Confirmations lost to a concurrent winner",
            registry
        )?;

        let reconcile_failures_total = register_int_counter_with_registry!(
            "canteen_reconcile_failures_total",
            "Fatal post-removal append failures",
            registry
        )?;

        let balance_query_duration = register_histogram_with_registry!(
            "canteen_balance_query_duration_seconds",
            "Balance computation latency",
            vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0],
            registry
        )?;

        Ok(Self {
            orders_total,
            claims_total,
            payments_confirmed_total,
            stale_confirmations_total,
            reconcile_failures_total,
            balance_query_duration,
            registry,
        })
    }

    /// Record an appended order
    pub fn record_order(&self) {
        self.orders_total.inc();
    }

    /// Record an enqueued claim
    pub fn record_claim(&self) {
        self.claims_total.inc();
    }

    /// Record a confirmed payment
    pub fn record_confirmation(&self) {
        self.payments_confirmed_total.inc();
    }

    /// Record a confirmation that lost the race
    pub fn record_stale_confirmation(&self) {
        self.stale_confirmations_total.inc();
    }

    /// Record a fatal reconciliation failure
    pub fn record_reconcile_failure(&self) {
        self.reconcile_failures_total.inc();
    }

    /// Record balance query latency
    pub fn record_balance_query(&self, duration_seconds: f64) {
        self.balance_query_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
