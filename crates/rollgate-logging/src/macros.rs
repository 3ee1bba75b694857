//! ---
//! rg_section: "03-logging"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Structured logging context for cluster and member events."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---

/// Shared expansion used by the level-specific macros.
#[doc(hidden)]
#[macro_export]
macro_rules! __rg_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            cluster = ctx.cluster.unwrap_or(""),
            namespace = ctx.namespace.unwrap_or(""),
            member = ctx.member.unwrap_or(""),
            ordinal = ctx.ordinal.map(i64::from).unwrap_or(-1),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with cluster/member context.
#[macro_export]
macro_rules! rg_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__rg_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__rg_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with cluster/member context.
#[macro_export]
macro_rules! rg_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__rg_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__rg_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with cluster/member context.
#[macro_export]
macro_rules! rg_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__rg_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__rg_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with cluster/member context.
#[macro_export]
macro_rules! rg_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__rg_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__rg_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
