//! ---
//! rg_section: "04-restart-orchestration"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Health gate polling with retry budget, deadline, and cancellation."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use rollgate_common::config::{HealthConfig, RetryConfig};
use rollgate_common::model::{ClusterIdentity, HealthStatus};
use rollgate_logging::{rg_debug, rg_warn, LogContext};
use rollgate_resilience::{CancelSignal, RetryBudget, RetryPolicy};
use thiserror::Error;
use tokio::time::Instant;
use tracing::info;

use crate::metrics::RolloutMetrics;
use crate::ports::{HealthSource, QueryError};

/// Polling cadence and bounds applied to every health gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between two health queries while the cluster is not GREEN.
    pub interval: Duration,
    /// Upper bound on one gate. `None` waits indefinitely (still cancellable).
    pub timeout: Option<Duration>,
    /// Budget for consecutive failed queries.
    pub retry: RetryPolicy,
}

impl PollPolicy {
    /// Policy with the default retry budget.
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self {
            interval,
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry budget for failed queries.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Policy from the `[health]` and `[retry]` sections.
    pub fn from_config(health: &HealthConfig, retry: &RetryConfig) -> Self {
        Self::new(health.poll_interval, health.gate_timeout()).with_retry(
            RetryPolicy::new(retry.max_retries, retry.base_delay, retry.jitter)
                .with_max_delay(retry.max_delay),
        )
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&HealthConfig::default(), &RetryConfig::default())
    }
}

/// Why a health gate did not open.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HealthError {
    /// The retry budget ran out, or a query failed permanently.
    #[error("health of {cluster} unavailable after {attempts} failed queries: {last_error}")]
    Unavailable {
        cluster: ClusterIdentity,
        attempts: u32,
        last_error: QueryError,
    },
    /// The gate deadline passed before a GREEN answer.
    #[error("{cluster} did not report GREEN within {timeout:?} (last status {last_status})")]
    Timeout {
        cluster: ClusterIdentity,
        timeout: Duration,
        last_status: HealthStatus,
    },
    /// The run was cancelled while the gate was open.
    #[error("health gate for {cluster} cancelled")]
    Cancelled { cluster: ClusterIdentity },
}

impl HealthError {
    fn label(&self) -> &'static str {
        match self {
            HealthError::Unavailable { .. } => "unavailable",
            HealthError::Timeout { .. } => "timeout",
            HealthError::Cancelled { .. } => "cancelled",
        }
    }
}

/// Blocks until a cluster reports GREEN.
#[derive(Clone)]
pub struct HealthMonitor {
    source: Arc<dyn HealthSource>,
    cancel: CancelSignal,
    metrics: Option<RolloutMetrics>,
}

impl HealthMonitor {
    /// Monitor reading from `source` that is never cancelled.
    pub fn new(source: Arc<dyn HealthSource>) -> Self {
        Self {
            source,
            cancel: CancelSignal::never(),
            metrics: None,
        }
    }

    /// Abort gates once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Record queries and gate durations.
    pub fn with_metrics(mut self, metrics: RolloutMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The signal gates and restart actions observe.
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Poll until the cluster is GREEN, the retry budget is spent, the policy
    /// timeout elapses, or the run is cancelled.
    pub async fn await_healthy(
        &self,
        cluster: &ClusterIdentity,
        policy: &PollPolicy,
    ) -> Result<(), HealthError> {
        let started = Instant::now();
        let result = self.poll(cluster, policy, started).await;
        if let Some(metrics) = &self.metrics {
            let label = match &result {
                Ok(()) => "green",
                Err(err) => err.label(),
            };
            metrics.observe_gate(label, started.elapsed());
        }
        result
    }

    async fn poll(
        &self,
        cluster: &ClusterIdentity,
        policy: &PollPolicy,
        started: Instant,
    ) -> Result<(), HealthError> {
        let deadline = policy.timeout.map(|timeout| started + timeout);
        let mut budget = RetryBudget::new(policy.retry);
        let mut last_status = HealthStatus::Unknown;
        let mut cycle: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(HealthError::Cancelled {
                    cluster: cluster.clone(),
                });
            }
            cycle += 1;

            let Some(query) = self.query(cluster, deadline).await? else {
                return Err(timed_out(cluster, policy, last_status));
            };

            let pause = match query {
                Ok(status) => {
                    budget.record_success();
                    last_status = status;
                    if let Some(metrics) = &self.metrics {
                        metrics.record_health_check(status);
                    }
                    info!(
                        cluster = %cluster.name(),
                        namespace = %cluster.namespace(),
                        status = %status,
                        cycle,
                        "health check"
                    );
                    if status.is_green() {
                        return Ok(());
                    }
                    policy.interval
                }
                Err(err) => {
                    let retryable = err.is_retryable();
                    if let Some(metrics) = &self.metrics {
                        metrics.record_query_failure(retryable);
                    }
                    let next = budget.record_failure();
                    match next {
                        Some(delay) if retryable => {
                            let ctx = LogContext::new()
                                .with_cluster(cluster.name(), cluster.namespace())
                                .with_phase("HEALTH_RETRY");
                            rg_warn!(
                                context = ctx,
                                "health query failed ({} consecutive), retrying in {:?}: {}",
                                budget.consecutive_failures(),
                                delay,
                                err
                            );
                            delay
                        }
                        _ => {
                            return Err(HealthError::Unavailable {
                                cluster: cluster.clone(),
                                attempts: budget.consecutive_failures(),
                                last_error: err,
                            });
                        }
                    }
                }
            };

            let wake = Instant::now() + pause;
            let wake = match deadline {
                Some(deadline) if deadline < wake => deadline,
                _ => wake,
            };
            if self.cancel.sleep_until(wake).await.is_err() {
                return Err(HealthError::Cancelled {
                    cluster: cluster.clone(),
                });
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(timed_out(cluster, policy, last_status));
            }
        }
    }

    /// Issue one query bounded by the gate deadline and cancellation.
    /// `Ok(None)` means the deadline passed while the query was in flight.
    async fn query(
        &self,
        cluster: &ClusterIdentity,
        deadline: Option<Instant>,
    ) -> Result<Option<Result<HealthStatus, QueryError>>, HealthError> {
        let request = self.source.cluster_health(cluster);
        let bounded = async {
            match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, request).await.ok(),
                None => Some(request.await),
            }
        };
        tokio::select! {
            _ = self.cancel.cancelled() => {
                let ctx = LogContext::new().with_cluster(cluster.name(), cluster.namespace());
                rg_debug!(context = ctx, "health query abandoned on cancellation");
                Err(HealthError::Cancelled { cluster: cluster.clone() })
            }
            outcome = bounded => Ok(outcome),
        }
    }
}

fn timed_out(cluster: &ClusterIdentity, policy: &PollPolicy, last_status: HealthStatus) -> HealthError {
    HealthError::Timeout {
        cluster: cluster.clone(),
        timeout: policy.timeout.unwrap_or_default(),
        last_status,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rollgate_resilience::cancel_pair;

    use super::*;

    /// Replays scripted answers, then repeats `fallback` forever.
    struct Scripted {
        script: Mutex<VecDeque<Result<HealthStatus, QueryError>>>,
        fallback: Result<HealthStatus, QueryError>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(
            script: Vec<Result<HealthStatus, QueryError>>,
            fallback: Result<HealthStatus, QueryError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HealthSource for Scripted {
        async fn cluster_health(&self, _: &ClusterIdentity) -> Result<HealthStatus, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    /// Accepts queries but never answers them.
    #[derive(Default)]
    struct Stalled {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HealthSource for Stalled {
        async fn cluster_health(&self, _: &ClusterIdentity) -> Result<HealthStatus, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    fn cluster() -> ClusterIdentity {
        ClusterIdentity::new("foo", "ns-a")
    }

    fn policy(timeout: Option<Duration>, retries: u32) -> PollPolicy {
        PollPolicy::new(Duration::from_secs(10), timeout).with_retry(RetryPolicy::new(
            retries,
            Duration::from_millis(100),
            Duration::ZERO,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn returns_once_green() {
        let source = Scripted::new(
            vec![
                Ok(HealthStatus::Yellow),
                Ok(HealthStatus::Unknown),
                Ok(HealthStatus::Red),
            ],
            Ok(HealthStatus::Green),
        );
        let monitor = HealthMonitor::new(source.clone());
        let started = Instant::now();
        monitor
            .await_healthy(&cluster(), &policy(None, 0))
            .await
            .unwrap();
        assert_eq!(source.calls(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_never_green() {
        let source = Scripted::new(vec![], Ok(HealthStatus::Yellow));
        let monitor = HealthMonitor::new(source.clone());
        let started = Instant::now();
        let err = monitor
            .await_healthy(&cluster(), &policy(Some(Duration::from_secs(25)), 0))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            HealthError::Timeout {
                cluster: cluster(),
                timeout: Duration::from_secs(25),
                last_status: HealthStatus::Yellow,
            }
        );
        assert_eq!(started.elapsed(), Duration::from_secs(25));
        // Queries at t=0, 10, 20.
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_within_budget_are_retried() {
        let source = Scripted::new(
            vec![
                Err(QueryError::transient("connection reset")),
                Err(QueryError::transient("503")),
            ],
            Ok(HealthStatus::Green),
        );
        let monitor = HealthMonitor::new(source.clone());
        monitor
            .await_healthy(&cluster(), &policy(None, 2))
            .await
            .unwrap();
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_is_unavailable() {
        let source = Scripted::new(vec![], Err(QueryError::transient("connection refused")));
        let monitor = HealthMonitor::new(source.clone());
        let err = monitor
            .await_healthy(&cluster(), &policy(None, 2))
            .await
            .unwrap_err();
        match err {
            HealthError::Unavailable { attempts, last_error, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, QueryError::transient("connection refused"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_skips_retries() {
        let source = Scripted::new(vec![], Err(QueryError::permanent("cratedb foo not found")));
        let monitor = HealthMonitor::new(source.clone());
        let err = monitor
            .await_healthy(&cluster(), &policy(None, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::Unavailable { attempts: 1, .. }));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_query_resets_failure_count() {
        let source = Scripted::new(
            vec![
                Err(QueryError::transient("a")),
                Ok(HealthStatus::Yellow),
                Err(QueryError::transient("b")),
            ],
            Ok(HealthStatus::Green),
        );
        let monitor = HealthMonitor::new(source.clone());
        monitor
            .await_healthy(&cluster(), &policy(None, 1))
            .await
            .unwrap();
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_unbounded_gate() {
        let source = Scripted::new(vec![], Ok(HealthStatus::Red));
        let (handle, signal) = cancel_pair();
        let monitor = HealthMonitor::new(source.clone()).with_cancel(signal);
        let gate = tokio::spawn(async move {
            monitor
                .await_healthy(&cluster(), &policy(None, 0))
                .await
        });
        tokio::time::sleep(Duration::from_secs(35)).await;
        handle.cancel();
        let err = gate.await.unwrap().unwrap_err();
        assert_eq!(err, HealthError::Cancelled { cluster: cluster() });
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_query_is_bounded_by_gate_deadline() {
        let source = Arc::new(Stalled::default());
        let monitor = HealthMonitor::new(source.clone());
        let started = Instant::now();
        let err = monitor
            .await_healthy(&cluster(), &policy(Some(Duration::from_secs(42)), 3))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            HealthError::Timeout {
                cluster: cluster(),
                timeout: Duration::from_secs(42),
                last_status: HealthStatus::Unknown,
            }
        );
        assert_eq!(started.elapsed(), Duration::from_secs(42));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_hung_query() {
        let source = Arc::new(Stalled::default());
        let (handle, signal) = cancel_pair();
        let monitor = HealthMonitor::new(source.clone()).with_cancel(signal);
        let started = Instant::now();
        let gate = tokio::spawn(async move {
            monitor
                .await_healthy(&cluster(), &policy(Some(Duration::from_secs(600)), 0))
                .await
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.cancel();
        let err = gate.await.unwrap().unwrap_err();
        assert_eq!(err, HealthError::Cancelled { cluster: cluster() });
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
