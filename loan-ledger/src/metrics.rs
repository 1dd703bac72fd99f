//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the loan ledger.
//!
//! # Metrics
//!
//! - `loan_ledger_transitions_total{operation}` - Committed transitions
//! - `loan_ledger_rejections_total{operation,kind}` - Voided transitions by error class
//! - `loan_ledger_escrowed_collateral` - Collateral currently held in escrow

use crate::{error::ErrorKind, types::{Amount, Operation}};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
///
/// Collectors are registered in a private registry, so several ledgers (and
/// tests) can each own one.
#[derive(Clone)]
pub struct Metrics {
    /// Committed transitions by operation
    pub transitions_total: IntCounterVec,

    /// Voided transitions by operation and error kind
    pub rejections_total: IntCounterVec,

    /// Collateral in escrow (saturates at `i64::MAX`)
    pub escrowed_collateral: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "loan_ledger_transitions_total",
                "Total number of committed transitions",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new(
                "loan_ledger_rejections_total",
                "Total number of voided transitions",
            ),
            &["operation", "kind"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let escrowed_collateral = IntGauge::new(
            "loan_ledger_escrowed_collateral",
            "Native currency currently held as collateral",
        )?;
        registry.register(Box::new(escrowed_collateral.clone()))?;

        Ok(Self {
            transitions_total,
            rejections_total,
            escrowed_collateral,
            registry,
        })
    }

    /// Record a committed transition
    pub fn record_commit(&self, operation: Operation) {
        self.transitions_total
            .with_label_values(&[operation.as_str()])
            .inc();
    }

    /// Record a voided transition
    pub fn record_rejection(&self, operation: Operation, kind: ErrorKind) {
        self.rejections_total
            .with_label_values(&[operation.as_str(), kind.as_str()])
            .inc();
    }

    /// Update the escrow gauge
    pub fn set_escrow(&self, escrow: Amount) {
        self.escrowed_collateral
            .set(i64::try_from(escrow).unwrap_or(i64::MAX));
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every collector in Prometheus text format
    pub fn encode_text(&self) -> crate::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| crate::Error::Other(format!("Failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| crate::Error::Other(format!("Metrics are not UTF-8: {}", e)))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("escrowed_collateral", &self.escrowed_collateral.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.escrowed_collateral.get(), 0);
        // A second collector must not clash with the first
        assert!(Metrics::new().is_ok());
    }

    #[test]
    fn test_record_commit_and_rejection() {
        let metrics = Metrics::new().unwrap();
        metrics.record_commit(Operation::Fund);
        metrics.record_commit(Operation::Fund);
        metrics.record_rejection(Operation::Claim, ErrorKind::PreconditionViolation);

        assert_eq!(
            metrics.transitions_total.with_label_values(&["fund"]).get(),
            2
        );
        assert_eq!(
            metrics
                .rejections_total
                .with_label_values(&["claim", "precondition_violation"])
                .get(),
            1
        );
    }

    #[test]
    fn test_escrow_gauge_saturates() {
        let metrics = Metrics::new().unwrap();
        metrics.set_escrow(42);
        assert_eq!(metrics.escrowed_collateral.get(), 42);
        metrics.set_escrow(Amount::MAX);
        assert_eq!(metrics.escrowed_collateral.get(), i64::MAX);
    }

    #[test]
    fn test_encode_text() {
        let metrics = Metrics::new().unwrap();
        metrics.record_commit(Operation::Request);
        let text = metrics.encode_text().unwrap();
        assert!(text.contains("loan_ledger_transitions_total{operation=\"request\"} 1"));
        assert!(text.contains("loan_ledger_escrowed_collateral 0"));
    }
}
