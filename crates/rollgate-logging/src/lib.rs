//! ---
//! rg_section: "03-logging"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Structured logging context for cluster and member events."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod macros;

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// CrateDB resource name.
    pub cluster: Option<&'a str>,
    /// Namespace of the cluster.
    pub namespace: Option<&'a str>,
    /// Pod name of the member being processed.
    pub member: Option<&'a str>,
    /// StatefulSet ordinal of the member.
    pub ordinal: Option<u32>,
    /// Sequencer state the event belongs to.
    pub phase: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the cluster name and namespace.
    pub fn with_cluster(mut self, name: &'a str, namespace: &'a str) -> Self {
        self.cluster = Some(name);
        self.namespace = Some(namespace);
        self
    }

    /// Attach a member pod name and ordinal.
    pub fn with_member(mut self, pod_name: &'a str, ordinal: u32) -> Self {
        self.member = Some(pod_name);
        self.ordinal = Some(ordinal);
        self
    }

    /// Attach the sequencer phase.
    pub fn with_phase(mut self, phase: &'a str) -> Self {
        self.phase = Some(phase);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was abandoned.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized run lifecycle event with a success/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    match outcome {
        SystemEventOutcome::Success => tracing::info!(
            event,
            outcome = outcome.as_str(),
            cluster = ctx.cluster.unwrap_or(""),
            namespace = ctx.namespace.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::error!(
            event,
            outcome = outcome.as_str(),
            cluster = ctx.cluster.unwrap_or(""),
            namespace = ctx.namespace.unwrap_or(""),
            message = %message
        ),
    }
}
