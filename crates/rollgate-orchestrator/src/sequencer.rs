//! ---
//! rg_section: "04-restart-orchestration"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Per-cluster gate, act, gate sequencing of restart plans."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rollgate_common::model::{ClusterIdentity, RestartPlan, WorkloadMember};
use rollgate_logging::{rg_error, rg_info, LogContext};
use thiserror::Error;

use crate::health::{HealthError, HealthMonitor, PollPolicy};
use crate::metrics::RolloutMetrics;
use crate::ports::{ActionError, RestartAction};

/// Lifecycle of one member within a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    /// Waiting for the cluster to be GREEN before the restart.
    PendingPreHealth,
    /// Restart action in flight.
    Restarting,
    /// Waiting for the cluster to be GREEN again.
    PendingPostHealth,
    /// Restarted and the cluster recovered.
    Done,
    /// The member's gate or action failed; the plan stopped here.
    Failed,
}

impl MemberState {
    /// Upper snake case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberState::PendingPreHealth => "PENDING_PRE_HEALTH",
            MemberState::Restarting => "RESTARTING",
            MemberState::PendingPostHealth => "PENDING_POST_HEALTH",
            MemberState::Done => "DONE",
            MemberState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for MemberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of a member after a sequence run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    /// The member.
    pub member: WorkloadMember,
    /// Where it ended up.
    pub state: MemberState,
}

/// Final state of every member of a plan, in plan order.
///
/// After a failure the members before the failing one are `DONE`, the failing
/// one is `FAILED` and the rest stay `PENDING_PRE_HEALTH`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceReport {
    /// One record per plan member.
    pub members: Vec<MemberRecord>,
}

impl SequenceReport {
    /// Number of members that reached DONE.
    pub fn restarted(&self) -> usize {
        self.count(MemberState::Done)
    }

    /// Number of members left in `state`.
    pub fn count(&self, state: MemberState) -> usize {
        self.members
            .iter()
            .filter(|record| record.state == state)
            .count()
    }

    /// Members before `failed` are DONE, `failed` itself FAILED, the rest pending.
    fn stopped_at(plan: &RestartPlan, failed: usize) -> Self {
        let members = plan
            .members()
            .iter()
            .enumerate()
            .map(|(index, member)| MemberRecord {
                member: member.clone(),
                state: match index.cmp(&failed) {
                    Ordering::Less => MemberState::Done,
                    Ordering::Equal => MemberState::Failed,
                    Ordering::Greater => MemberState::PendingPreHealth,
                },
            })
            .collect();
        Self { members }
    }
}

/// Failure that aborted a cluster's plan. Carries the report at the time of failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SequenceError {
    /// The cluster was not GREEN before the member's restart.
    #[error(
        "pre-restart gate for {member} failed after {completed} completed members: {source}",
        completed = .report.restarted()
    )]
    PreGate {
        member: WorkloadMember,
        report: SequenceReport,
        source: HealthError,
    },
    /// The restart action itself failed.
    #[error(
        "restart of {member} failed after {completed} completed members: {source}",
        completed = .report.restarted()
    )]
    Action {
        member: WorkloadMember,
        report: SequenceReport,
        source: ActionError,
    },
    /// The cluster did not return to GREEN after the restart.
    #[error(
        "post-restart gate for {member} failed after {completed} completed members: {source}",
        completed = .report.restarted()
    )]
    PostGate {
        member: WorkloadMember,
        report: SequenceReport,
        source: HealthError,
    },
}

impl SequenceError {
    /// Per-member states when the plan stopped.
    pub fn report(&self) -> &SequenceReport {
        match self {
            SequenceError::PreGate { report, .. }
            | SequenceError::Action { report, .. }
            | SequenceError::PostGate { report, .. } => report,
        }
    }

    /// Members that reached DONE before the failure.
    pub fn completed(&self) -> usize {
        self.report().restarted()
    }

    /// The member that failed.
    pub fn member(&self) -> &WorkloadMember {
        match self {
            SequenceError::PreGate { member, .. }
            | SequenceError::Action { member, .. }
            | SequenceError::PostGate { member, .. } => member,
        }
    }

    /// State the failing member was in when it failed.
    pub fn phase(&self) -> MemberState {
        match self {
            SequenceError::PreGate { .. } => MemberState::PendingPreHealth,
            SequenceError::Action { .. } => MemberState::Restarting,
            SequenceError::PostGate { .. } => MemberState::PendingPostHealth,
        }
    }
}

/// Walks a plan member by member: gate, act, gate.
#[derive(Clone)]
pub struct RestartSequencer {
    monitor: HealthMonitor,
    action: Arc<dyn RestartAction>,
    metrics: Option<RolloutMetrics>,
}

impl RestartSequencer {
    /// Sequencer gating on `monitor` and disrupting members with `action`.
    pub fn new(monitor: HealthMonitor, action: Arc<dyn RestartAction>) -> Self {
        Self {
            monitor,
            action,
            metrics: None,
        }
    }

    /// Count issued restarts.
    pub fn with_metrics(mut self, metrics: RolloutMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Label of the configured restart action.
    pub fn action_mode(&self) -> &'static str {
        self.action.mode()
    }

    /// Restart every member of `plan` in order. Stops at the first failure.
    pub async fn run(
        &self,
        cluster: &ClusterIdentity,
        plan: &RestartPlan,
        policy: &PollPolicy,
    ) -> Result<SequenceReport, SequenceError> {
        for (index, member) in plan.members().iter().enumerate() {
            let ctx = LogContext::new()
                .with_cluster(cluster.name(), cluster.namespace())
                .with_member(&member.pod_name, member.ordinal);

            transition(&ctx, MemberState::PendingPreHealth);
            if let Err(source) = self.monitor.await_healthy(cluster, policy).await {
                failed(&ctx, MemberState::PendingPreHealth, &source);
                return Err(SequenceError::PreGate {
                    member: member.clone(),
                    report: SequenceReport::stopped_at(plan, index),
                    source,
                });
            }

            transition(&ctx, MemberState::Restarting);
            if let Err(source) = self
                .action
                .restart(cluster, member, self.monitor.cancel_signal())
                .await
            {
                failed(&ctx, MemberState::Restarting, &source);
                return Err(SequenceError::Action {
                    member: member.clone(),
                    report: SequenceReport::stopped_at(plan, index),
                    source,
                });
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_restart(self.action.mode());
            }

            transition(&ctx, MemberState::PendingPostHealth);
            if let Err(source) = self.monitor.await_healthy(cluster, policy).await {
                failed(&ctx, MemberState::PendingPostHealth, &source);
                return Err(SequenceError::PostGate {
                    member: member.clone(),
                    report: SequenceReport::stopped_at(plan, index),
                    source,
                });
            }

            transition(&ctx, MemberState::Done);
        }

        // No index reaches `len`, so every member is DONE.
        Ok(SequenceReport::stopped_at(plan, plan.len()))
    }
}

fn transition(ctx: &LogContext<'_>, state: MemberState) {
    let ctx = ctx.clone().with_phase(state.as_str());
    rg_info!(context = ctx, "member entered {}", state);
}

fn failed(ctx: &LogContext<'_>, from: MemberState, cause: &dyn std::error::Error) {
    let ctx = ctx.clone().with_phase(MemberState::Failed.as_str());
    rg_error!(context = ctx, "member failed during {}: {}", from, cause);
}
