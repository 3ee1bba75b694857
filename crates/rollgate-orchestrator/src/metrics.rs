//! ---
//! rg_section: "04-restart-orchestration"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Prometheus instrumentation for restart runs."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use rollgate_common::model::HealthStatus;

/// Registry shared between the orchestration components.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Metrics published while gating and restarting members.
#[derive(Clone)]
pub struct RolloutMetrics {
    registry: SharedRegistry,
    health_checks_total: IntCounterVec,
    health_query_failures_total: IntCounterVec,
    gate_wait_seconds: HistogramVec,
    restarts_total: IntCounterVec,
    cluster_outcomes_total: IntCounterVec,
}

impl RolloutMetrics {
    /// Register the metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let health_checks_total = IntCounterVec::new(
            Opts::new(
                "rollgate_health_checks_total",
                "Health queries answered, by reported status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(health_checks_total.clone()))?;

        let health_query_failures_total = IntCounterVec::new(
            Opts::new(
                "rollgate_health_query_failures_total",
                "Health queries that failed before a status was read",
            ),
            &["retryable"],
        )?;
        registry.register(Box::new(health_query_failures_total.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "rollgate_gate_wait_seconds",
            "Time spent inside a health gate, by result",
        )
        .buckets(prometheus::exponential_buckets(0.5, 2.0, 14)?);
        let gate_wait_seconds = HistogramVec::new(histogram_opts, &["result"])?;
        registry.register(Box::new(gate_wait_seconds.clone()))?;

        let restarts_total = IntCounterVec::new(
            Opts::new(
                "rollgate_restarts_total",
                "Member restart actions issued, by action mode",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(restarts_total.clone()))?;

        let cluster_outcomes_total = IntCounterVec::new(
            Opts::new(
                "rollgate_cluster_outcomes_total",
                "Clusters that finished a run, by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(cluster_outcomes_total.clone()))?;

        Ok(Self {
            registry,
            health_checks_total,
            health_query_failures_total,
            gate_wait_seconds,
            restarts_total,
            cluster_outcomes_total,
        })
    }

    /// Count one answered health query.
    pub fn record_health_check(&self, status: HealthStatus) {
        self.health_checks_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    /// Count one failed health query.
    pub fn record_query_failure(&self, retryable: bool) {
        let label = if retryable { "true" } else { "false" };
        self.health_query_failures_total
            .with_label_values(&[label])
            .inc();
    }

    /// Record how long a gate stayed closed and how it ended.
    pub fn observe_gate(&self, result: &str, waited: Duration) {
        self.gate_wait_seconds
            .with_label_values(&[result])
            .observe(waited.as_secs_f64());
    }

    /// Count one issued restart action.
    pub fn record_restart(&self, mode: &str) {
        self.restarts_total.with_label_values(&[mode]).inc();
    }

    /// Count one finished cluster.
    pub fn record_cluster_outcome(&self, outcome: &str) {
        self.cluster_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for RolloutMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolloutMetrics").finish_non_exhaustive()
    }
}
