//! ---
//! rg_section: "05-networking-external-interfaces"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Pod delete action awaiting StatefulSet recreation."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams};
use kube::runtime::wait::await_condition;
use kube::Client;
use rollgate_common::model::{ClusterIdentity, WorkloadMember};
use rollgate_orchestrator::{ActionError, QueryError, RestartAction};
use rollgate_resilience::CancelSignal;
use tracing::info;

use crate::error::classify;
use crate::limiter::ApiLimiter;

/// Whether the pod reports the `Ready` condition as `True`.
pub fn pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|condition| condition.type_ == "Ready" && condition.status == "True")
        })
}

/// Condition met once a pod with a uid other than `previous_uid` is Ready.
pub fn is_recreated_and_ready(previous_uid: Option<String>) -> impl Fn(Option<&Pod>) -> bool {
    move |pod: Option<&Pod>| {
        pod.is_some_and(|pod| pod.metadata.uid != previous_uid && pod_ready(pod))
    }
}

/// Deletes the member pod and waits for the StatefulSet controller to bring
/// a replacement up to Ready.
#[derive(Clone)]
pub struct PodRestartAction {
    client: Client,
    limiter: ApiLimiter,
    recreate_timeout: Duration,
}

impl PodRestartAction {
    /// Action waiting at most `recreate_timeout` for each replacement pod.
    pub fn new(client: Client, limiter: ApiLimiter, recreate_timeout: Duration) -> Self {
        Self {
            client,
            limiter,
            recreate_timeout,
        }
    }

    async fn delete(&self, api: &Api<Pod>, pod: &str) -> Result<Option<String>, QueryError> {
        let existing = self
            .limiter
            .run(async {
                api.get_opt(pod)
                    .await
                    .map_err(|err| classify(err, &format!("reading pod {pod}")))
            })
            .await?;
        let previous_uid = existing.and_then(|pod| pod.metadata.uid);

        self.limiter
            .run(async {
                match api.delete(pod, &DeleteParams::default()).await {
                    Ok(_) => Ok(()),
                    // Already gone; the controller is recreating it.
                    Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
                    Err(err) => Err(classify(err, &format!("deleting pod {pod}"))),
                }
            })
            .await?;
        Ok(previous_uid)
    }
}

#[async_trait]
impl RestartAction for PodRestartAction {
    fn mode(&self) -> &'static str {
        "delete-pod"
    }

    async fn restart(
        &self,
        cluster: &ClusterIdentity,
        member: &WorkloadMember,
        cancel: &CancelSignal,
    ) -> Result<(), ActionError> {
        let pod = member.pod_name.as_str();
        let api: Api<Pod> = Api::namespaced(self.client.clone(), cluster.namespace());

        let previous_uid = self
            .delete(&api, pod)
            .await
            .map_err(|source| ActionError::Request {
                pod: pod.to_string(),
                source,
            })?;
        info!(
            cluster = %cluster,
            pod,
            timeout_secs = self.recreate_timeout.as_secs(),
            "pod deleted; waiting for recreation"
        );

        let recreated = await_condition(api, pod, is_recreated_and_ready(previous_uid));
        tokio::select! {
            _ = cancel.cancelled() => Err(ActionError::Cancelled { pod: pod.to_string() }),
            waited = tokio::time::timeout(self.recreate_timeout, recreated) => match waited {
                Ok(Ok(_)) => {
                    info!(cluster = %cluster, pod, "pod recreated and ready");
                    Ok(())
                }
                Ok(Err(err)) => Err(ActionError::Request {
                    pod: pod.to_string(),
                    source: QueryError::transient(format!("watching pod {pod}: {err}")),
                }),
                Err(_) => Err(ActionError::RecreateTimeout {
                    pod: pod.to_string(),
                    timeout: self.recreate_timeout,
                }),
            },
        }
    }
}
