//! ---
//! rg_section: "05-networking-external-interfaces"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Kubernetes client construction from a kubeconfig context."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::info;

/// Build a client for `context` from the kubeconfig named by `KUBECONFIG`
/// (or the default location). An empty context selects the current one.
pub async fn connect(context: &str) -> Result<Client> {
    let kubeconfig = Kubeconfig::read().context("failed to read kubeconfig")?;
    let options = KubeConfigOptions {
        context: (!context.is_empty()).then(|| context.to_string()),
        ..KubeConfigOptions::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .with_context(|| format!("failed to load kubeconfig context `{context}`"))?;
    info!(
        context,
        cluster_url = %config.cluster_url,
        namespace = %config.default_namespace,
        "kubernetes client configured"
    );
    Client::try_from(config).context("failed to construct kubernetes client")
}
