//! ---
//! rg_section: "04-restart-orchestration"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Fleet-wide restart runs with continue-on-error semantics."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fmt;

use futures::stream::{self, StreamExt};
use rollgate_common::model::{ClusterIdentity, RestartPlan};
use rollgate_logging::{log_system_event, LogContext, SystemEventOutcome};
use tracing::{info, warn};

use crate::health::PollPolicy;
use crate::metrics::RolloutMetrics;
use crate::planner::{PlanError, RestartPlanner};
use crate::ports::{ClusterInventory, ClusterRecord, QueryError};
use crate::sequencer::{RestartSequencer, SequenceError};

/// Restricts which clusters take part in a run. Empty lists match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetFilter {
    /// Allowed namespaces.
    pub namespaces: Vec<String>,
    /// Allowed CrateDB resource names.
    pub clusters: Vec<String>,
}

impl FleetFilter {
    /// Whether `cluster` takes part in the run.
    pub fn matches(&self, cluster: &ClusterIdentity) -> bool {
        let namespace_ok =
            self.namespaces.is_empty() || self.namespaces.iter().any(|ns| ns == cluster.namespace());
        let cluster_ok =
            self.clusters.is_empty() || self.clusters.iter().any(|name| name == cluster.name());
        namespace_ok && cluster_ok
    }
}

/// Why a cluster was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    /// No plan could be built.
    Planning(PlanError),
    /// The plan stopped at a failing member.
    Sequence(SequenceError),
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbandonReason::Planning(err) => write!(f, "{err}"),
            AbandonReason::Sequence(err) => write!(f, "{err}"),
        }
    }
}

/// How a cluster's sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterStatus {
    /// Every planned member was restarted.
    Done { restarted: usize },
    /// The cluster was left alone after a failure.
    Abandoned { restarted: usize, reason: AbandonReason },
}

/// Result of one cluster within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterOutcome {
    /// The cluster.
    pub cluster: ClusterIdentity,
    /// How it ended.
    pub status: ClusterStatus,
}

impl ClusterOutcome {
    /// Whether the cluster completed.
    pub fn is_done(&self) -> bool {
        matches!(self.status, ClusterStatus::Done { .. })
    }

    /// Members restarted before the cluster finished or was abandoned.
    pub fn restarted(&self) -> usize {
        match &self.status {
            ClusterStatus::Done { restarted } | ClusterStatus::Abandoned { restarted, .. } => {
                *restarted
            }
        }
    }
}

/// Per-cluster outcomes of one run, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// One outcome per cluster.
    pub outcomes: Vec<ClusterOutcome>,
}

impl RunSummary {
    /// Clusters that completed.
    pub fn completed(&self) -> impl Iterator<Item = &ClusterOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_done())
    }

    /// Clusters that were abandoned.
    pub fn abandoned(&self) -> impl Iterator<Item = &ClusterOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_done())
    }

    /// Whether no cluster was abandoned.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ClusterOutcome::is_done)
    }

    /// Members restarted across the fleet.
    pub fn total_restarted(&self) -> usize {
        self.outcomes.iter().map(ClusterOutcome::restarted).sum()
    }
}

/// Work item produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCluster {
    /// The cluster.
    pub cluster: ClusterIdentity,
    /// Its plan, or why it has none.
    pub plan: Result<RestartPlan, PlanError>,
}

/// Runs sequencers across a fleet of clusters.
#[derive(Clone)]
pub struct RestartOrchestrator {
    sequencer: RestartSequencer,
    policy: PollPolicy,
    max_concurrent: usize,
    metrics: Option<RolloutMetrics>,
}

impl RestartOrchestrator {
    /// Orchestrator running one cluster at a time.
    pub fn new(sequencer: RestartSequencer, policy: PollPolicy) -> Self {
        Self {
            sequencer,
            policy,
            max_concurrent: 1,
            metrics: None,
        }
    }

    /// Clusters sequenced at the same time, at least one.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Count cluster outcomes.
    pub fn with_metrics(mut self, metrics: RolloutMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Restart every planned cluster. A failing cluster never stops the others.
    pub async fn run_all(&self, clusters: Vec<(ClusterIdentity, RestartPlan)>) -> RunSummary {
        let items = clusters
            .into_iter()
            .map(|(cluster, plan)| PlannedCluster {
                cluster,
                plan: Ok(plan),
            })
            .collect();
        self.run_planned(items).await
    }

    /// Discover, plan and restart the fleet. Only an inventory failure is fatal.
    pub async fn run_fleet(
        &self,
        inventory: &dyn ClusterInventory,
        planner: &RestartPlanner,
        filter: &FleetFilter,
    ) -> Result<RunSummary, QueryError> {
        let planned = discover(inventory, planner, filter).await?;
        Ok(self.run_planned(planned).await)
    }

    /// Run discovered work items. Items without a plan are abandoned right away.
    pub async fn run_planned(&self, items: Vec<PlannedCluster>) -> RunSummary {
        log_system_event(
            None,
            "run.start",
            &format!(
                "restarting {} clusters with action {} ({} at a time)",
                items.len(),
                self.sequencer.action_mode(),
                self.max_concurrent
            ),
            SystemEventOutcome::Success,
        );

        let mut indexed: Vec<(usize, ClusterOutcome)> = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move { (index, self.run_one(item).await) })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);

        let summary = RunSummary {
            outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
        };
        let outcome = if summary.is_success() {
            SystemEventOutcome::Success
        } else {
            SystemEventOutcome::Fault
        };
        log_system_event(
            None,
            "run.finish",
            &format!(
                "{} clusters done, {} abandoned, {} members restarted",
                summary.completed().count(),
                summary.abandoned().count(),
                summary.total_restarted()
            ),
            outcome,
        );
        summary
    }

    async fn run_one(&self, item: PlannedCluster) -> ClusterOutcome {
        let PlannedCluster { cluster, plan } = item;
        let ctx = LogContext::new().with_cluster(cluster.name(), cluster.namespace());

        let status = match plan {
            Err(err) => ClusterStatus::Abandoned {
                restarted: 0,
                reason: AbandonReason::Planning(err),
            },
            Ok(plan) => {
                info!(cluster = %cluster, members = plan.len(), "cluster sequence starting");
                match self.sequencer.run(&cluster, &plan, &self.policy).await {
                    Ok(report) => ClusterStatus::Done {
                        restarted: report.restarted(),
                    },
                    Err(err) => ClusterStatus::Abandoned {
                        restarted: err.completed(),
                        reason: AbandonReason::Sequence(err),
                    },
                }
            }
        };

        match &status {
            ClusterStatus::Done { restarted } => {
                log_system_event(
                    Some(&ctx),
                    "cluster.done",
                    &format!("{restarted} members restarted"),
                    SystemEventOutcome::Success,
                );
                self.record_outcome("done");
            }
            ClusterStatus::Abandoned { restarted, reason } => {
                log_system_event(
                    Some(&ctx),
                    "cluster.abandoned",
                    &format!("abandoned after {restarted} members: {reason}"),
                    SystemEventOutcome::Fault,
                );
                self.record_outcome("abandoned");
            }
        }

        ClusterOutcome { cluster, status }
    }

    fn record_outcome(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cluster_outcome(outcome);
        }
    }
}

/// List the inventory, apply the filter and build a plan for each cluster.
/// Workloads are listed once per namespace.
pub async fn discover(
    inventory: &dyn ClusterInventory,
    planner: &RestartPlanner,
    filter: &FleetFilter,
) -> Result<Vec<PlannedCluster>, QueryError> {
    let mut records: Vec<ClusterRecord> = inventory
        .list_clusters()
        .await?
        .into_iter()
        .filter(|record| filter.matches(&record.identity))
        .collect();
    records.sort_by(|a, b| a.identity.cmp(&b.identity));

    let mut by_namespace = BTreeMap::new();
    let mut planned = Vec::with_capacity(records.len());
    for record in records {
        let namespace = record.identity.namespace().to_string();
        if !by_namespace.contains_key(&namespace) {
            let listed = planner.list_namespace(&namespace).await;
            by_namespace.insert(namespace.clone(), listed);
        }
        let plan = match &by_namespace[&namespace] {
            Ok(workloads) => planner.plan_from_workloads(&record.identity, workloads),
            Err(err) => Err(err.clone()),
        };
        if let Err(err) = &plan {
            warn!(cluster = %record.identity, error = %err, "cluster cannot be planned");
        }
        planned.push(PlannedCluster {
            cluster: record.identity,
            plan,
        });
    }
    Ok(planned)
}
