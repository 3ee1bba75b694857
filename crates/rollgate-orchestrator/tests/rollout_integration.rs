//! ---
//! rg_section: "04-restart-orchestration"
//! rg_subsection: "integration-tests"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Fleet restart runs against an in-memory cluster API."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rollgate_common::model::{ClusterIdentity, HealthStatus, WorkloadMember, WorkloadRecord};
use rollgate_orchestrator::{
    AbandonReason, ActionError, ClusterInventory, ClusterRecord, ClusterStatus, FleetFilter,
    HealthError, HealthMonitor, HealthSource, PlanError, PollPolicy, QueryError, RestartAction,
    RestartOrchestrator, RestartPlanner, RestartSequencer, RunSummary, SequenceError,
    WorkloadResolver, WorkloadSource,
};
use rollgate_resilience::{cancel_pair, CancelSignal, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Query(String, Option<HealthStatus>),
    Restart(String, String),
}

struct Scripted {
    script: VecDeque<Result<HealthStatus, QueryError>>,
    fallback: HealthStatus,
}

/// In-memory stand-in for the Kubernetes API: CrateDB resources, StatefulSets,
/// a scripted health signal per cluster and a pod restart recorder.
#[derive(Default)]
struct FakeFleet {
    clusters: Vec<ClusterIdentity>,
    workloads: Vec<WorkloadRecord>,
    health: Mutex<HashMap<ClusterIdentity, Scripted>>,
    events: Mutex<Vec<Event>>,
}

impl FakeFleet {
    fn with_cluster(mut self, name: &str, namespace: &str, replicas: u32) -> Self {
        self.clusters.push(ClusterIdentity::new(name, namespace));
        self.workloads.push(
            WorkloadRecord::new(format!("crate-data-hot-{name}"), namespace, replicas)
                .with_owner("CrateDB", name),
        );
        self
    }

    fn with_health(
        self,
        name: &str,
        namespace: &str,
        script: Vec<Result<HealthStatus, QueryError>>,
        fallback: HealthStatus,
    ) -> Self {
        self.health.lock().insert(
            ClusterIdentity::new(name, namespace),
            Scripted {
                script: script.into(),
                fallback,
            },
        );
        self
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn restarts(&self, cluster: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Restart(c, pod) if c == cluster => Some(pod),
                _ => None,
            })
            .collect()
    }

    fn queries(&self, cluster: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Query(c, _) if c == cluster))
            .count()
    }
}

#[async_trait]
impl HealthSource for FakeFleet {
    async fn cluster_health(&self, cluster: &ClusterIdentity) -> Result<HealthStatus, QueryError> {
        let answer = {
            let mut health = self.health.lock();
            match health.get_mut(cluster) {
                Some(scripted) => scripted
                    .script
                    .pop_front()
                    .unwrap_or(Ok(scripted.fallback)),
                None => Ok(HealthStatus::Green),
            }
        };
        self.events.lock().push(Event::Query(
            cluster.name().to_string(),
            answer.as_ref().ok().copied(),
        ));
        answer
    }
}

#[async_trait]
impl ClusterInventory for FakeFleet {
    async fn list_clusters(&self) -> Result<Vec<ClusterRecord>, QueryError> {
        Ok(self
            .clusters
            .iter()
            .map(|identity| ClusterRecord {
                identity: identity.clone(),
                cluster_name: Some(identity.name().to_string()),
                health: HealthStatus::Green,
            })
            .collect())
    }
}

#[async_trait]
impl WorkloadSource for FakeFleet {
    async fn list_workloads(&self, namespace: &str) -> Result<Vec<WorkloadRecord>, QueryError> {
        Ok(self
            .workloads
            .iter()
            .filter(|workload| workload.namespace == namespace)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RestartAction for FakeFleet {
    fn mode(&self) -> &'static str {
        "fake"
    }

    async fn restart(
        &self,
        cluster: &ClusterIdentity,
        member: &WorkloadMember,
        _cancel: &CancelSignal,
    ) -> Result<(), ActionError> {
        self.events.lock().push(Event::Restart(
            cluster.name().to_string(),
            member.pod_name.clone(),
        ));
        Ok(())
    }
}

fn policy(retries: u32) -> PollPolicy {
    PollPolicy::new(Duration::from_secs(10), Some(Duration::from_secs(60))).with_retry(
        RetryPolicy::new(retries, Duration::from_millis(100), Duration::ZERO),
    )
}

async fn run(fleet: &Arc<FakeFleet>, policy: PollPolicy, cancel: CancelSignal) -> RunSummary {
    let monitor = HealthMonitor::new(fleet.clone()).with_cancel(cancel);
    let sequencer = RestartSequencer::new(monitor, fleet.clone());
    let planner = RestartPlanner::new(fleet.clone(), WorkloadResolver::default());
    RestartOrchestrator::new(sequencer, policy)
        .run_fleet(fleet.as_ref(), &planner, &FleetFilter::default())
        .await
        .unwrap()
}

fn status_of<'a>(summary: &'a RunSummary, name: &str) -> &'a ClusterStatus {
    &summary
        .outcomes
        .iter()
        .find(|outcome| outcome.cluster.name() == name)
        .unwrap()
        .status
}

#[tokio::test(start_paused = true)]
async fn green_fleet_restarts_every_member() {
    let fleet = Arc::new(
        FakeFleet::default()
            .with_cluster("foo", "ns-a", 3)
            .with_cluster("bar", "ns-b", 3),
    );

    let summary = run(&fleet, policy(3), CancelSignal::never()).await;

    assert!(summary.is_success());
    assert_eq!(summary.total_restarted(), 6);
    assert_eq!(*status_of(&summary, "foo"), ClusterStatus::Done { restarted: 3 });
    assert_eq!(*status_of(&summary, "bar"), ClusterStatus::Done { restarted: 3 });
    assert_eq!(
        fleet.restarts("foo"),
        vec!["crate-data-hot-foo-0", "crate-data-hot-foo-1", "crate-data-hot-foo-2"]
    );
    assert!(fleet.queries("foo") + fleet.queries("bar") >= 12);
}

#[tokio::test(start_paused = true)]
async fn next_member_waits_for_post_restart_green() {
    let fleet = Arc::new(FakeFleet::default().with_cluster("foo", "ns-a", 2).with_health(
        "foo",
        "ns-a",
        vec![
            Ok(HealthStatus::Green),
            Ok(HealthStatus::Yellow),
            Ok(HealthStatus::Red),
            Ok(HealthStatus::Green),
        ],
        HealthStatus::Green,
    ));

    let summary = run(&fleet, policy(0), CancelSignal::never()).await;
    assert!(summary.is_success());

    let q = |status| Event::Query("foo".into(), Some(status));
    let r = |pod: &str| Event::Restart("foo".into(), pod.into());
    assert_eq!(
        fleet.events(),
        vec![
            q(HealthStatus::Green),
            r("crate-data-hot-foo-0"),
            q(HealthStatus::Yellow),
            q(HealthStatus::Red),
            q(HealthStatus::Green),
            q(HealthStatus::Green),
            r("crate-data-hot-foo-1"),
            q(HealthStatus::Green),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn gate_timeout_abandons_cluster_without_further_restarts() {
    let fleet = Arc::new(
        FakeFleet::default()
            .with_cluster("foo", "ns-a", 3)
            .with_cluster("bar", "ns-b", 2)
            .with_health("foo", "ns-a", vec![Ok(HealthStatus::Green)], HealthStatus::Yellow),
    );

    let summary = run(&fleet, policy(0), CancelSignal::never()).await;

    assert_eq!(fleet.restarts("foo"), vec!["crate-data-hot-foo-0"]);
    match status_of(&summary, "foo") {
        ClusterStatus::Abandoned {
            restarted: 0,
            reason: AbandonReason::Sequence(SequenceError::PostGate { member, source, .. }),
        } => {
            assert_eq!(member.ordinal, 0);
            assert!(matches!(
                source,
                HealthError::Timeout {
                    last_status: HealthStatus::Yellow,
                    ..
                }
            ));
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(*status_of(&summary, "bar"), ClusterStatus::Done { restarted: 2 });
    assert!(!summary.is_success());
}

#[tokio::test(start_paused = true)]
async fn transient_failures_within_budget_complete() {
    let fleet = Arc::new(
        FakeFleet::default()
            .with_cluster("foo", "ns-a", 3)
            .with_cluster("bar", "ns-b", 3)
            .with_health(
                "foo",
                "ns-a",
                vec![
                    Err(QueryError::transient("connection reset")),
                    Err(QueryError::transient("connection reset")),
                ],
                HealthStatus::Green,
            ),
    );

    let summary = run(&fleet, policy(2), CancelSignal::never()).await;

    assert!(summary.is_success());
    assert_eq!(fleet.restarts("foo").len(), 3);
    assert_eq!(fleet.restarts("bar").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_abandons_only_the_failing_cluster() {
    let fleet = Arc::new(
        FakeFleet::default()
            .with_cluster("foo", "ns-a", 3)
            .with_cluster("bar", "ns-b", 3)
            .with_health(
                "foo",
                "ns-a",
                vec![
                    Err(QueryError::transient("connection reset")),
                    Err(QueryError::transient("connection reset")),
                ],
                HealthStatus::Green,
            ),
    );

    let summary = run(&fleet, policy(0), CancelSignal::never()).await;

    assert!(matches!(
        status_of(&summary, "foo"),
        ClusterStatus::Abandoned {
            restarted: 0,
            reason: AbandonReason::Sequence(SequenceError::PreGate {
                source: HealthError::Unavailable { .. },
                ..
            }),
        }
    ));
    assert!(fleet.restarts("foo").is_empty());
    assert_eq!(*status_of(&summary, "bar"), ClusterStatus::Done { restarted: 3 });
}

#[tokio::test(start_paused = true)]
async fn rerun_on_healthy_fleet_is_stable() {
    let fleet = Arc::new(
        FakeFleet::default()
            .with_cluster("foo", "ns-a", 2)
            .with_cluster("bar", "ns-a", 1),
    );

    let first = run(&fleet, policy(1), CancelSignal::never()).await;
    let first_events = fleet.events();
    fleet.events.lock().clear();
    let second = run(&fleet, policy(1), CancelSignal::never()).await;

    assert_eq!(first, second);
    assert_eq!(first_events, fleet.events());
    assert_eq!(fleet.queries("foo"), 4);
    assert_eq!(fleet.queries("bar"), 2);
}

#[tokio::test(start_paused = true)]
async fn unplannable_cluster_is_abandoned_and_others_continue() {
    let mut fleet = FakeFleet::default().with_cluster("foo", "ns-a", 1);
    fleet.clusters.push(ClusterIdentity::new("orphan", "ns-a"));
    let fleet = Arc::new(fleet);

    let summary = run(&fleet, policy(1), CancelSignal::never()).await;

    assert_eq!(*status_of(&summary, "foo"), ClusterStatus::Done { restarted: 1 });
    assert!(matches!(
        status_of(&summary, "orphan"),
        ClusterStatus::Abandoned {
            reason: AbandonReason::Planning(PlanError::NoWorkloads { .. }),
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn cancelled_run_restarts_nothing() {
    let fleet = Arc::new(
        FakeFleet::default()
            .with_cluster("foo", "ns-a", 2)
            .with_cluster("bar", "ns-b", 2),
    );
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let summary = run(&fleet, policy(1), signal).await;

    assert_eq!(summary.abandoned().count(), 2);
    assert_eq!(summary.total_restarted(), 0);
    assert!(fleet.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_clusters_keep_input_order_in_summary() {
    let fleet = Arc::new(
        FakeFleet::default()
            .with_cluster("foo", "ns-a", 2)
            .with_cluster("bar", "ns-b", 1)
            .with_health(
                "foo",
                "ns-a",
                vec![Ok(HealthStatus::Yellow), Ok(HealthStatus::Yellow)],
                HealthStatus::Green,
            ),
    );
    let monitor = HealthMonitor::new(fleet.clone());
    let sequencer = RestartSequencer::new(monitor, fleet.clone());
    let orchestrator = RestartOrchestrator::new(sequencer, policy(0)).with_max_concurrent(2);

    let foo = ClusterIdentity::new("foo", "ns-a");
    let bar = ClusterIdentity::new("bar", "ns-b");
    let planner = RestartPlanner::new(fleet.clone(), WorkloadResolver::default());
    let foo_plan = planner.plan_cluster(&foo).await.unwrap();
    let bar_plan = planner.plan_cluster(&bar).await.unwrap();

    let summary = orchestrator
        .run_all(vec![(foo.clone(), foo_plan), (bar.clone(), bar_plan)])
        .await;

    let order: Vec<_> = summary.outcomes.iter().map(|o| o.cluster.clone()).collect();
    assert_eq!(order, vec![foo, bar]);
    assert!(summary.is_success());
    // bar finished while foo was still waiting for GREEN.
    let events = fleet.events();
    let bar_done = events
        .iter()
        .position(|e| *e == Event::Restart("bar".into(), "crate-data-hot-bar-0".into()))
        .unwrap();
    let foo_first = events
        .iter()
        .position(|e| *e == Event::Restart("foo".into(), "crate-data-hot-foo-0".into()))
        .unwrap();
    assert!(bar_done < foo_first);
}
