//! ---
//! rg_section: "04-restart-orchestration"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Builds per-cluster restart plans from listed workloads."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::sync::Arc;

use rollgate_common::model::{ClusterIdentity, MemberOrder, RestartPlan, WorkloadRecord};
use thiserror::Error;
use tracing::debug;

use crate::ports::{QueryError, WorkloadSource};
use crate::resolver::WorkloadResolver;

/// Why no restart plan could be built for a cluster.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// The namespace's workloads could not be listed.
    #[error("listing workloads in namespace {namespace} failed: {source}")]
    Workloads { namespace: String, source: QueryError },
    /// Nothing in the namespace belongs to the cluster.
    #[error("no workload in {cluster} resolves to the cluster ({unresolved} without an owner)")]
    NoWorkloads {
        cluster: ClusterIdentity,
        unresolved: usize,
    },
}

/// Turns the workloads of a namespace into an ordered restart plan.
#[derive(Clone)]
pub struct RestartPlanner {
    workloads: Arc<dyn WorkloadSource>,
    resolver: WorkloadResolver,
    order: MemberOrder,
}

impl RestartPlanner {
    /// Planner listing from `workloads` and attributing with `resolver`.
    pub fn new(workloads: Arc<dyn WorkloadSource>, resolver: WorkloadResolver) -> Self {
        Self {
            workloads,
            resolver,
            order: MemberOrder::default(),
        }
    }

    /// Member order within each workload.
    pub fn with_order(mut self, order: MemberOrder) -> Self {
        self.order = order;
        self
    }

    /// List the workloads of one namespace.
    pub async fn list_namespace(&self, namespace: &str) -> Result<Vec<WorkloadRecord>, PlanError> {
        self.workloads
            .list_workloads(namespace)
            .await
            .map_err(|source| PlanError::Workloads {
                namespace: namespace.to_string(),
                source,
            })
    }

    /// List the cluster's namespace and plan from it.
    pub async fn plan_cluster(&self, cluster: &ClusterIdentity) -> Result<RestartPlan, PlanError> {
        let workloads = self.list_namespace(cluster.namespace()).await?;
        self.plan_from_workloads(cluster, &workloads)
    }

    /// Members of every workload owned by `cluster`, workloads in name order.
    pub fn plan_from_workloads(
        &self,
        cluster: &ClusterIdentity,
        workloads: &[WorkloadRecord],
    ) -> Result<RestartPlan, PlanError> {
        let mut owned: Vec<&WorkloadRecord> = Vec::new();
        let mut unresolved = 0;
        for workload in workloads {
            if workload.namespace != cluster.namespace() {
                continue;
            }
            match self.resolver.resolve(workload) {
                Ok(owner) if &owner == cluster => owned.push(workload),
                Ok(_) => {}
                Err(err) => {
                    unresolved += 1;
                    debug!(error = %err, "skipping workload");
                }
            }
        }

        if owned.is_empty() {
            return Err(PlanError::NoWorkloads {
                cluster: cluster.clone(),
                unresolved,
            });
        }

        owned.sort_by(|a, b| a.name.cmp(&b.name));
        let mut plan = RestartPlan::default();
        for workload in owned {
            plan.extend(workload.members(self.order));
        }
        debug!(cluster = %cluster, members = plan.len(), "restart plan built");
        Ok(plan)
    }
}
