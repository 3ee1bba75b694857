//! ---
//! rg_section: "07-resilience-fault-tolerance"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Retry budgets and cancellable waits."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod cancel;
pub mod retry;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal, Cancelled};
pub use retry::{RetryBudget, RetryPolicy};
