//! ---
//! rg_section: "05-networking-external-interfaces"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "CrateDB custom resource inventory and health reads."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use async_trait::async_trait;
use kube::api::{Api, ListParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Client, ResourceExt};
use rollgate_common::model::{ClusterIdentity, HealthStatus};
use rollgate_orchestrator::{ClusterInventory, ClusterRecord, HealthSource, QueryError};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::classify;
use crate::limiter::ApiLimiter;

/// API group of the CrateDB operator's custom resource.
pub const CRATEDB_GROUP: &str = "cloud.crate.io";
/// Served version of the custom resource.
pub const CRATEDB_VERSION: &str = "v1";
/// Kind of the custom resource.
pub const CRATEDB_KIND: &str = "CrateDB";
/// Plural resource name used in API paths.
pub const CRATEDB_PLURAL: &str = "cratedbs";

/// API resource descriptor for `cratedbs.cloud.crate.io/v1`.
pub fn cratedb_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(CRATEDB_GROUP, CRATEDB_VERSION, CRATEDB_KIND);
    ApiResource::from_gvk_with_plural(&gvk, CRATEDB_PLURAL)
}

/// `status.crateDBStatus.health`, or `Unknown` when absent or not a string.
pub fn health_of(object: &DynamicObject) -> HealthStatus {
    HealthStatus::from_wire(
        object
            .data
            .pointer("/status/crateDBStatus/health")
            .and_then(Value::as_str),
    )
}

/// `spec.cluster.name`, when present.
pub fn cluster_name_of(object: &DynamicObject) -> Option<String> {
    object
        .data
        .pointer("/spec/cluster/name")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn record_of(object: &DynamicObject) -> Option<ClusterRecord> {
    let name = object.metadata.name.clone()?;
    let namespace = object.namespace()?;
    Some(ClusterRecord {
        identity: ClusterIdentity::new(name, namespace),
        cluster_name: cluster_name_of(object),
        health: health_of(object),
    })
}

/// Reads CrateDB resources through the dynamic API.
#[derive(Clone)]
pub struct CrateDbClient {
    client: Client,
    resource: ApiResource,
    limiter: ApiLimiter,
}

impl CrateDbClient {
    /// Adapter sharing `client` and `limiter` with the other adapters.
    pub fn new(client: Client, limiter: ApiLimiter) -> Self {
        Self {
            client,
            resource: cratedb_resource(),
            limiter,
        }
    }
}

#[async_trait]
impl ClusterInventory for CrateDbClient {
    async fn list_clusters(&self) -> Result<Vec<ClusterRecord>, QueryError> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &self.resource);
        let list = self
            .limiter
            .run(async {
                api.list(&ListParams::default())
                    .await
                    .map_err(|err| classify(err, "listing cratedbs"))
            })
            .await?;

        let mut records = Vec::with_capacity(list.items.len());
        for object in &list.items {
            match record_of(object) {
                Some(record) => records.push(record),
                None => warn!(name = %object.name_any(), "skipping cratedb without namespace"),
            }
        }
        debug!(count = records.len(), "cratedb inventory listed");
        Ok(records)
    }
}

#[async_trait]
impl HealthSource for CrateDbClient {
    async fn cluster_health(&self, cluster: &ClusterIdentity) -> Result<HealthStatus, QueryError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), cluster.namespace(), &self.resource);
        let object = self
            .limiter
            .run(async {
                api.get(cluster.name())
                    .await
                    .map_err(|err| classify(err, &format!("reading cratedb {cluster}")))
            })
            .await?;
        Ok(health_of(&object))
    }
}
