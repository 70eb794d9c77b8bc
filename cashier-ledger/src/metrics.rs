//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `cashier_tickets_created_total` - Tickets persisted, by type
//! - `cashier_withdrawals_rejected_total` - Withdrawals refused, by reason
//! - `cashier_code_collisions_total` - Ticket inserts retried on a duplicate code
//! - `cashier_store_timeouts_total` - Store requests that missed their deadline
//! - `cashier_export_duration_seconds` - Histogram of CSV export latencies

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Tickets persisted
    pub tickets_created: IntCounterVec,

    /// Withdrawals refused
    pub withdrawals_rejected: IntCounterVec,

    /// Code collisions
    pub code_collisions: IntCounter,

    /// Store timeouts
    pub store_timeouts: IntCounter,

    /// Export duration histogram
    pub export_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let tickets_created = IntCounterVec::new(
            Opts::new("cashier_tickets_created_total", "Tickets persisted"),
            &["type"],
        )?;
        registry.register(Box::new(tickets_created.clone()))?;

        let withdrawals_rejected = IntCounterVec::new(
            Opts::new("cashier_withdrawals_rejected_total", "Withdrawals refused"),
            &["reason"],
        )?;
        registry.register(Box::new(withdrawals_rejected.clone()))?;

        let code_collisions = IntCounter::new(
            "cashier_code_collisions_total",
            "Ticket inserts retried on a duplicate code",
        )?;
        registry.register(Box::new(code_collisions.clone()))?;

        let store_timeouts = IntCounter::new(
            "cashier_store_timeouts_total",
            "Store requests that missed their deadline",
        )?;
        registry.register(Box::new(store_timeouts.clone()))?;

        let export_duration = Histogram::with_opts(
            HistogramOpts::new(
                "cashier_export_duration_seconds",
                "Histogram of CSV export latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(export_duration.clone()))?;

        Ok(Self {
            tickets_created,
            withdrawals_rejected,
            code_collisions,
            store_timeouts,
            export_duration,
            registry,
        })
    }

    /// Record a persisted ticket
    pub fn record_ticket_created(&self, ticket_type: &str) {
        self.tickets_created.with_label_values(&[ticket_type]).inc();
    }

    /// Record a refused withdrawal
    pub fn record_withdrawal_rejected(&self, reason: &str) {
        self.withdrawals_rejected.with_label_values(&[reason]).inc();
    }

    /// Record a code collision
    pub fn record_code_collision(&self) {
        self.code_collisions.inc();
    }

    /// Record a store timeout
    pub fn record_store_timeout(&self) {
        self.store_timeouts.inc();
    }

    /// Record export duration
    pub fn record_export_duration(&self, duration_seconds: f64) {
        self.export_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
