//! ---
//! rg_section: "05-networking-external-interfaces"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Semaphore bound on concurrent Kubernetes API requests."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::future::Future;
use std::sync::Arc;

use rollgate_orchestrator::QueryError;
use tokio::sync::Semaphore;

/// Caps the number of in-flight API requests shared by all adapters.
/// Permits are held for the duration of one request.
#[derive(Debug, Clone)]
pub struct ApiLimiter {
    semaphore: Arc<Semaphore>,
}

impl ApiLimiter {
    /// Limiter admitting `capacity` requests at once, at least one.
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    /// Run `request` once a permit is available.
    pub async fn run<T, F>(&self, request: F) -> Result<T, QueryError>
    where
        F: Future<Output = Result<T, QueryError>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| QueryError::transient("api request limiter closed"))?;
        request.await
    }
}
