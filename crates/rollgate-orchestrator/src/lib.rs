//! ---
//! rg_section: "04-restart-orchestration"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Health-gated restart sequencing across CrateDB clusters."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
//! Orchestration core. Each cluster is walked member by member: wait for GREEN,
//! restart the member, wait for GREEN again. Clusters are independent and a
//! failing cluster never blocks the rest of the fleet.

#![warn(missing_docs)]

pub mod health;
pub mod metrics;
pub mod orchestrator;
pub mod planner;
pub mod ports;
pub mod resolver;
pub mod sequencer;

pub use health::{HealthError, HealthMonitor, PollPolicy};
pub use metrics::{new_registry, RolloutMetrics, SharedRegistry};
pub use orchestrator::{
    discover, AbandonReason, ClusterOutcome, ClusterStatus, FleetFilter, PlannedCluster,
    RestartOrchestrator, RunSummary,
};
pub use planner::{PlanError, RestartPlanner};
pub use ports::{
    ActionError, ClusterInventory, ClusterRecord, DryRunAction, HealthSource, QueryError,
    QueryErrorKind, RestartAction, WorkloadSource,
};
pub use resolver::{ResolutionError, WorkloadResolver};
pub use sequencer::{MemberRecord, MemberState, RestartSequencer, SequenceError, SequenceReport};
