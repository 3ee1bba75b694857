//! ---
//! rg_section: "05-networking-external-interfaces"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "StatefulSet listing for restart planning."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::api::{Api, ListParams};
use kube::Client;
use rollgate_common::model::{OwnerRef, WorkloadRecord};
use rollgate_orchestrator::{QueryError, WorkloadSource};
use tracing::debug;

use crate::error::classify;
use crate::limiter::ApiLimiter;

/// Replica count assumed by Kubernetes when `spec.replicas` is unset.
const DEFAULT_REPLICAS: i32 = 1;

/// Convert a listed StatefulSet. Returns `None` for objects without a name.
pub fn workload_record(sts: &StatefulSet, namespace: &str) -> Option<WorkloadRecord> {
    let meta = &sts.metadata;
    let name = meta.name.clone()?;
    let replicas = sts
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(DEFAULT_REPLICAS);

    Some(WorkloadRecord {
        name,
        namespace: meta
            .namespace
            .clone()
            .unwrap_or_else(|| namespace.to_string()),
        desired_replicas: u32::try_from(replicas).unwrap_or(0),
        owners: meta
            .owner_references
            .iter()
            .flatten()
            .map(|owner| OwnerRef {
                kind: owner.kind.clone(),
                name: owner.name.clone(),
            })
            .collect(),
        labels: meta.labels.clone().unwrap_or_default(),
    })
}

/// Lists StatefulSets per namespace.
#[derive(Clone)]
pub struct StatefulSetSource {
    client: Client,
    limiter: ApiLimiter,
}

impl StatefulSetSource {
    /// Adapter sharing `client` and `limiter` with the other adapters.
    pub fn new(client: Client, limiter: ApiLimiter) -> Self {
        Self { client, limiter }
    }
}

#[async_trait]
impl WorkloadSource for StatefulSetSource {
    async fn list_workloads(&self, namespace: &str) -> Result<Vec<WorkloadRecord>, QueryError> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        let list = self
            .limiter
            .run(async {
                api.list(&ListParams::default())
                    .await
                    .map_err(|err| classify(err, &format!("listing statefulsets in {namespace}")))
            })
            .await?;
        let records: Vec<WorkloadRecord> = list
            .items
            .iter()
            .filter_map(|sts| workload_record(sts, namespace))
            .collect();
        debug!(namespace, count = records.len(), "statefulsets listed");
        Ok(records)
    }
}
