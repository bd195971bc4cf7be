//! # Reconcile
//!
//! A reconciliation engine for managed objects.
//!
//! Given an observed object and an ordered chain of handlers, the engine
//! drives the managed system from its current state toward the desired
//! state, one handler at a time.
//!
//! ## Core Concepts
//!
//! - **Resource**: a handler for one facet of an object (read current state,
//!   derive desired state, compute a patch, apply changes)
//! - **Patch**: the create, delete and update changes a handler decided on
//! - **Context**: the per-pass request object carrying logging metadata and
//!   the two cancellation signals
//! - **RetryResource**: a decorator that retries any handler's operations
//!   under a [`Backoff`] policy
//!
//! ## Pipeline
//!
//! For every handler, in chain order:
//!
//! 1. current state
//! 2. desired state
//! 3. update patch ([`process_update`]) or delete patch ([`process_delete`])
//! 4. apply the create change, if any
//! 5. apply the delete change, if any
//! 6. apply the update change, if any
//!
//! Before every step the engine checks the pass context. A canceled
//! reconciliation ends the pass successfully; a canceled resource skips the
//! rest of the current handler and continues with the next one. Any handler
//! error ends the pass.
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{Context, RetryResource, RetryResourceConfig, process_update};
//!
//! let resources = reconcile::retry_resource::wrap(
//!     vec![Box::new(DeploymentResource::new(client.clone())), Box::new(ServiceResource::new(client))],
//!     &reconcile::default_backoff_factory(),
//! )?;
//!
//! let ctx = Context::background().with_meta("object", "my-app");
//! process_update(&ctx, &object, &resources)?;
//! ```

pub mod backoff;
pub mod context;
pub mod error;
pub mod patch;
pub mod process;
pub mod resource;
pub mod retry_resource;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use backoff::{
    Backoff, BackoffConfig, BackoffFactory, ConstantBackoff, ExponentialBackoff, StopBackoff,
    default_backoff_factory, retry_notify, retry_notify_when,
};
pub use context::{CancelHandle, Cancellation, Context};
pub use error::{Error, Result};
pub use patch::{ChangeKind, Patch};
pub use process::{process_delete, process_update};
pub use resource::{BoxedResource, Operation, Resource};
pub use retry_resource::{RetryObserver, RetryResource, RetryResourceConfig};
