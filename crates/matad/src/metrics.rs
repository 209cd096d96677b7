//! Prometheus metrics for coordinator observability.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone)]
pub struct CoordinatorMetrics {
    pub jobs_started: Counter,
    pub jobs_aborted: Counter,
    pub poll_failures: Counter,
    pub specs_published: Counter,
    pub spec_publish_failures: Counter,
    pub acks_applied: Counter,
    pub acks_discarded: Counter,
    pub running_jobs: Gauge,
    pub pending_feature_sets: Gauge,
    pub ack_queue_depth: Gauge,
    pub registry: Arc<Registry>,
}

impl CoordinatorMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let jobs_started = Counter::default();
        registry.register(
            "mata_jobs_started_total",
            "Ingestion jobs submitted to the backend",
            jobs_started.clone(),
        );

        let jobs_aborted = Counter::default();
        registry.register(
            "mata_jobs_aborted_total",
            "Surplus ingestion jobs handed to the backend for abort",
            jobs_aborted.clone(),
        );

        let poll_failures = Counter::default();
        registry.register(
            "mata_poll_failures_total",
            "Reconcile passes aborted by a transient failure",
            poll_failures.clone(),
        );

        let specs_published = Counter::default();
        registry.register(
            "mata_specs_published_total",
            "Feature-set specs acknowledged by the broker",
            specs_published.clone(),
        );

        let spec_publish_failures = Counter::default();
        registry.register(
            "mata_spec_publish_failures_total",
            "Spec publishes the broker did not acknowledge",
            spec_publish_failures.clone(),
        );

        let acks_applied = Counter::default();
        registry.register(
            "mata_acks_applied_total",
            "Delivery acks folded into feature-set state",
            acks_applied.clone(),
        );

        let acks_discarded = Counter::default();
        registry.register(
            "mata_acks_discarded_total",
            "Delivery acks dropped as malformed, unknown or stale",
            acks_discarded.clone(),
        );

        let running_jobs = Gauge::default();
        registry.register(
            "mata_running_jobs",
            "Ingestion jobs currently running",
            running_jobs.clone(),
        );

        let pending_feature_sets = Gauge::default();
        registry.register(
            "mata_pending_feature_sets",
            "Feature sets awaiting delivery confirmation",
            pending_feature_sets.clone(),
        );

        let ack_queue_depth = Gauge::default();
        registry.register(
            "mata_ack_queue_depth",
            "Pending messages on the ack stream",
            ack_queue_depth.clone(),
        );

        Self {
            jobs_started,
            jobs_aborted,
            poll_failures,
            specs_published,
            spec_publish_failures,
            acks_applied,
            acks_discarded,
            running_jobs,
            pending_feature_sets,
            ack_queue_depth,
            registry: Arc::new(registry),
        }
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        encode(&mut buf, &self.registry).unwrap();
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_all_metrics() {
        let metrics = CoordinatorMetrics::new();
        let output = metrics.encode();

        assert!(output.contains("mata_jobs_started_total"));
        assert!(output.contains("mata_jobs_aborted_total"));
        assert!(output.contains("mata_poll_failures_total"));
        assert!(output.contains("mata_specs_published_total"));
        assert!(output.contains("mata_acks_applied_total"));
        assert!(output.contains("mata_acks_discarded_total"));
        assert!(output.contains("mata_running_jobs"));
        assert!(output.contains("mata_pending_feature_sets"));
        assert!(output.contains("mata_ack_queue_depth"));
    }

    #[test]
    fn gauge_set_reflected_in_encode() {
        let metrics = CoordinatorMetrics::new();
        metrics.running_jobs.set(3);

        let output = metrics.encode();
        assert!(
            output.contains("mata_running_jobs 3"),
            "Expected gauge value 3 in output: {output}"
        );
    }

    #[test]
    fn counter_inc_reflected_in_encode() {
        let metrics = CoordinatorMetrics::new();
        metrics.acks_discarded.inc();
        metrics.acks_discarded.inc();

        let output = metrics.encode();
        // prometheus-client appends _total to counter names per the
        // OpenMetrics spec.
        assert!(
            output.contains("mata_acks_discarded_total_total 2"),
            "Expected counter value 2 in output: {output}"
        );
    }
}
