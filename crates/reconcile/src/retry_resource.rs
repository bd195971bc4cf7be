//! Retrying decorator for any [`Resource`]
//!
//! Every operation of the wrapped handler is re-invoked under a backoff
//! policy until it succeeds or the policy is exhausted. The decorator
//! reports its own name and forwards `underlying()` so stacked decorators
//! still resolve to the innermost handler.

use crate::backoff::{Backoff, BackoffFactory, ExponentialBackoff, retry_notify};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::patch::Patch;
use crate::resource::{BoxedResource, Operation, Resource};
use anyhow::anyhow;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Identifier of the retry decorator
pub const NAME: &str = "retry";

/// Observer invoked on every retry, in addition to the warning log
pub type RetryObserver = Arc<dyn Fn(Operation, &anyhow::Error, Duration) + Send + Sync>;

/// Configuration for [`RetryResource::new`]
pub struct RetryResourceConfig<O, S, C> {
    /// The handler to wrap (required)
    pub resource: Option<BoxedResource<O, S, C>>,
    /// Retry policy; defaults to [`ExponentialBackoff::default`]
    pub backoff: Option<Box<dyn Backoff>>,
}

impl<O, S, C> Default for RetryResourceConfig<O, S, C> {
    fn default() -> Self {
        Self {
            resource: None,
            backoff: None,
        }
    }
}

/// A [`Resource`] that retries the operations of the handler it wraps
pub struct RetryResource<O, S, C> {
    resource: BoxedResource<O, S, C>,
    backoff: Mutex<Box<dyn Backoff>>,
    observer: Option<RetryObserver>,
}

impl<O, S, C> RetryResource<O, S, C> {
    pub fn new(config: RetryResourceConfig<O, S, C>) -> Result<Self> {
        let resource = config.resource.ok_or_else(|| {
            Error::InvalidConfig("config.resource must not be empty".to_string())
        })?;
        let backoff = config
            .backoff
            .unwrap_or_else(|| Box::new(ExponentialBackoff::default()));

        Ok(Self {
            resource,
            backoff: Mutex::new(backoff),
            observer: None,
        })
    }

    /// Register an observer called before every retry
    pub fn with_observer(mut self, observer: RetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The handler directly wrapped by this decorator
    pub fn inner(&self) -> &dyn Resource<O, S, C> {
        self.resource.as_ref()
    }

    fn retry<T>(
        &self,
        ctx: &Context,
        operation: Operation,
        f: impl FnMut() -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        // One retry loop at a time per decorator; the policy is not shared.
        let mut backoff = self
            .backoff
            .lock()
            .map_err(|_| anyhow!("backoff policy lock poisoned"))?;

        retry_notify(&mut **backoff, f, |err: &anyhow::Error, delay| {
            log::warn!(
                "{ctx} underlying_resource={} retrying '{operation}' in {delay:?} due to error ({err:#})",
                self.resource.underlying().name(),
            );
            if let Some(observer) = &self.observer {
                observer(operation, err, delay);
            }
        })
    }
}

impl<O, S, C> Resource<O, S, C> for RetryResource<O, S, C> {
    fn name(&self) -> &str {
        NAME
    }

    fn current_state(&self, ctx: &Context, obj: &O) -> anyhow::Result<S> {
        self.retry(ctx, Operation::GetCurrentState, || {
            self.resource.current_state(ctx, obj)
        })
    }

    fn desired_state(&self, ctx: &Context, obj: &O) -> anyhow::Result<S> {
        self.retry(ctx, Operation::GetDesiredState, || {
            self.resource.desired_state(ctx, obj)
        })
    }

    fn new_update_patch(
        &self,
        ctx: &Context,
        obj: &O,
        current: &S,
        desired: &S,
    ) -> anyhow::Result<Option<Patch<C>>> {
        self.retry(ctx, Operation::NewUpdatePatch, || {
            self.resource.new_update_patch(ctx, obj, current, desired)
        })
    }

    fn new_delete_patch(
        &self,
        ctx: &Context,
        obj: &O,
        current: &S,
        desired: &S,
    ) -> anyhow::Result<Option<Patch<C>>> {
        self.retry(ctx, Operation::NewDeletePatch, || {
            self.resource.new_delete_patch(ctx, obj, current, desired)
        })
    }

    fn apply_create_change(&self, ctx: &Context, obj: &O, change: &C) -> anyhow::Result<()> {
        self.retry(ctx, Operation::ApplyCreateChange, || {
            self.resource.apply_create_change(ctx, obj, change)
        })
    }

    fn apply_delete_change(&self, ctx: &Context, obj: &O, change: &C) -> anyhow::Result<()> {
        self.retry(ctx, Operation::ApplyDeleteChange, || {
            self.resource.apply_delete_change(ctx, obj, change)
        })
    }

    fn apply_update_change(&self, ctx: &Context, obj: &O, change: &C) -> anyhow::Result<()> {
        self.retry(ctx, Operation::ApplyUpdateChange, || {
            self.resource.apply_update_change(ctx, obj, change)
        })
    }

    fn underlying(&self) -> &dyn Resource<O, S, C> {
        self.resource.underlying()
    }
}

/// Wrap every handler of a chain in a [`RetryResource`], preserving order.
///
/// Each decorator gets its own policy from `factory`.
pub fn wrap<O, S, C>(
    resources: Vec<BoxedResource<O, S, C>>,
    factory: &BackoffFactory,
) -> Result<Vec<BoxedResource<O, S, C>>>
where
    O: 'static,
    S: 'static,
    C: 'static,
{
    resources
        .into_iter()
        .map(|resource| {
            let wrapped = RetryResource::new(RetryResourceConfig {
                resource: Some(resource),
                backoff: Some(factory()),
            })?;
            Ok(Box::new(wrapped) as BoxedResource<O, S, C>)
        })
        .collect()
}
