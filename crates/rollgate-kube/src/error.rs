//! ---
//! rg_section: "05-networking-external-interfaces"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Classification of Kubernetes API failures."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use rollgate_orchestrator::QueryError;

/// HTTP status codes for which repeating the same request cannot help.
pub fn is_permanent_status(code: u16) -> bool {
    matches!(code, 400 | 404 | 405 | 410 | 422)
}

/// Map a kube error onto the retry classification used by the health gate.
/// Transport failures, throttling, auth hiccups and server errors are transient.
pub fn classify(err: kube::Error, what: &str) -> QueryError {
    let permanent = matches!(&err, kube::Error::Api(resp) if is_permanent_status(resp.code));
    let message = format!("{what}: {err}");
    if permanent {
        QueryError::permanent(message)
    } else {
        QueryError::transient(message)
    }
}
