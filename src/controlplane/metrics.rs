//! Deployer Metrics
//!
//! Prometheus collectors for component operations and convergence polling,
//! kept in a registry owned by the deployer rather than the global default.

use crate::crd::ComponentKind;
use crate::error::{Error, Result};
use crate::lifecycle::ConvergenceResult;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

/// Convergence can take minutes; buckets span seconds to the create timeout
const CONVERGENCE_BUCKETS: &[f64] = &[1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0];

pub struct DeployerMetrics {
    registry: Registry,
    operations: CounterVec,
    poll_reads: CounterVec,
    convergence: HistogramVec,
}

impl DeployerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let operations = CounterVec::new(
            Opts::new(
                "deployer_operations_total",
                "Component operations by kind, operation and outcome",
            ),
            &["kind", "operation", "outcome"],
        )
        .map_err(metrics_error)?;

        let poll_reads = CounterVec::new(
            Opts::new(
                "deployer_poll_reads_total",
                "Backend status reads issued while waiting for convergence",
            ),
            &["kind"],
        )
        .map_err(metrics_error)?;

        let convergence = HistogramVec::new(
            HistogramOpts::new(
                "deployer_convergence_seconds",
                "Time from submission to a terminal convergence outcome",
            )
            .buckets(CONVERGENCE_BUCKETS.to_vec()),
            &["kind", "outcome"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(operations.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(poll_reads.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(convergence.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            operations,
            poll_reads,
            convergence,
        })
    }

    /// Count one finished operation
    pub fn record_operation(&self, kind: ComponentKind, operation: &str, outcome: &str) {
        self.operations
            .with_label_values(&[&kind.to_string(), operation, outcome])
            .inc();
    }

    /// Record the reads and duration of one convergence poll
    pub fn observe_convergence(&self, kind: ComponentKind, result: &ConvergenceResult) {
        let kind = kind.to_string();
        self.poll_reads
            .with_label_values(&[&kind])
            .inc_by(f64::from(result.reads));
        self.convergence
            .with_label_values(&[&kind, &result.outcome.to_string()])
            .observe(result.elapsed.as_secs_f64());
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every collector
    pub fn encode(&self) -> Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::PollOutcome;
    use std::time::Duration;

    #[test]
    fn test_metrics_exposition() {
        let metrics = DeployerMetrics::new().unwrap();
        metrics.record_operation(ComponentKind::Peer, "create", "success");
        metrics.observe_convergence(
            ComponentKind::Peer,
            &ConvergenceResult {
                outcome: PollOutcome::Deployed,
                status: None,
                artifact: None,
                reads: 4,
                elapsed: Duration::from_secs(12),
            },
        );

        let (content_type, body) = metrics.encode().unwrap();
        let body = String::from_utf8(body).unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains(r#"deployer_operations_total{kind="peer",operation="create",outcome="success"} 1"#));
        assert!(body.contains(r#"deployer_poll_reads_total{kind="peer"} 4"#));
        assert!(body.contains("deployer_convergence_seconds_bucket"));
    }
}
