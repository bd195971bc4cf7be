//! Resource trait - the handler contract
//!
//! A Resource handles one facet of a managed object. For every
//! reconciliation pass the engine asks it for the current and desired
//! state, lets it compute a patch, and then applies the changes the patch
//! carries.

use crate::context::Context;
use crate::patch::Patch;
use anyhow::Result;
use std::fmt;

/// Core trait for reconciliation handlers
///
/// `O` is the object being reconciled, `S` the state type and `C` the change
/// type shared by every handler of a chain.
///
/// Apply operations may be re-invoked by a retrying decorator and must be
/// safe to run more than once. Patch computation must be deterministic for
/// identical inputs.
///
/// # Example
///
/// ```ignore
/// use reconcile::{Context, Patch, Resource};
///
/// struct Replicas;
///
/// impl Resource<Deployment, u32, u32> for Replicas {
///     fn name(&self) -> &str {
///         "replicas"
///     }
///
///     fn current_state(&self, _ctx: &Context, obj: &Deployment) -> anyhow::Result<u32> {
///         cluster::running_replicas(&obj.name)
///     }
///
///     fn desired_state(&self, _ctx: &Context, obj: &Deployment) -> anyhow::Result<u32> {
///         Ok(obj.spec.replicas)
///     }
///
///     fn new_update_patch(
///         &self,
///         _ctx: &Context,
///         _obj: &Deployment,
///         current: &u32,
///         desired: &u32,
///     ) -> anyhow::Result<Option<Patch<u32>>> {
///         if current == desired {
///             return Ok(None);
///         }
///         Ok(Some(Patch::new().with_update(*desired)))
///     }
///
///     // ...
///
///     fn underlying(&self) -> &dyn Resource<Deployment, u32, u32> {
///         self
///     }
/// }
/// ```
pub trait Resource<O, S, C>: Send + Sync {
    /// Stable identifier used in logs and metrics
    fn name(&self) -> &str;

    /// Read the managed system's actual state for this handler
    fn current_state(&self, ctx: &Context, obj: &O) -> Result<S>;

    /// Derive the desired state from the object's specification
    fn desired_state(&self, ctx: &Context, obj: &O) -> Result<S>;

    /// Compute the changes moving `current` toward `desired`
    ///
    /// `None` means there is nothing to apply.
    fn new_update_patch(
        &self,
        ctx: &Context,
        obj: &O,
        current: &S,
        desired: &S,
    ) -> Result<Option<Patch<C>>>;

    /// Compute the cleanup changes for an object being deleted
    fn new_delete_patch(
        &self,
        ctx: &Context,
        obj: &O,
        current: &S,
        desired: &S,
    ) -> Result<Option<Patch<C>>>;

    fn apply_create_change(&self, ctx: &Context, obj: &O, change: &C) -> Result<()>;

    fn apply_delete_change(&self, ctx: &Context, obj: &O, change: &C) -> Result<()>;

    fn apply_update_change(&self, ctx: &Context, obj: &O, change: &C) -> Result<()>;

    /// The innermost non-decorating handler
    ///
    /// Concrete handlers return `self`; decorators delegate to the handler
    /// they wrap.
    fn underlying(&self) -> &dyn Resource<O, S, C>;
}

/// A boxed resource for type-erased storage in a chain
pub type BoxedResource<O, S, C> = Box<dyn Resource<O, S, C>>;

/// Fallible operations of the [`Resource`] contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetCurrentState,
    GetDesiredState,
    NewUpdatePatch,
    NewDeletePatch,
    ApplyCreateChange,
    ApplyDeleteChange,
    ApplyUpdateChange,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetCurrentState => "get_current_state",
            Operation::GetDesiredState => "get_desired_state",
            Operation::NewUpdatePatch => "new_update_patch",
            Operation::NewDeletePatch => "new_delete_patch",
            Operation::ApplyCreateChange => "apply_create_change",
            Operation::ApplyDeleteChange => "apply_delete_change",
            Operation::ApplyUpdateChange => "apply_update_change",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
