//! Resource set routing
//!
//! A resource set bundles the handler chain for one flavor of object. The
//! router picks exactly one set per observed object.

use crate::error::{Error, Result};
use reconcile::{BoxedResource, Context};

/// A handler chain plus the predicate deciding which objects it owns
pub trait ResourceSet<O, S, C>: Send + Sync {
    /// Whether this set is responsible for `obj`
    fn handles(&self, obj: &O) -> bool;

    /// Prepare the pass context before any handler runs
    fn init_ctx(&self, ctx: Context, _obj: &O) -> anyhow::Result<Context> {
        Ok(ctx)
    }

    /// The ordered handler chain
    fn resources(&self) -> &[BoxedResource<O, S, C>];
}

type HandlesFn<O> = Box<dyn Fn(&O) -> bool + Send + Sync>;
type InitCtxFn<O> = Box<dyn Fn(Context, &O) -> anyhow::Result<Context> + Send + Sync>;

/// [`ResourceSet`] assembled from closures
pub struct BasicResourceSet<O, S, C> {
    handles: HandlesFn<O>,
    init_ctx: Option<InitCtxFn<O>>,
    resources: Vec<BoxedResource<O, S, C>>,
}

impl<O, S, C> BasicResourceSet<O, S, C> {
    pub fn new(
        resources: Vec<BoxedResource<O, S, C>>,
        handles: impl Fn(&O) -> bool + Send + Sync + 'static,
    ) -> Result<Self> {
        if resources.is_empty() {
            return Err(Error::InvalidConfig(
                "resource set must not be empty".to_string(),
            ));
        }
        Ok(Self {
            handles: Box::new(handles),
            init_ctx: None,
            resources,
        })
    }

    pub fn with_init_ctx(
        mut self,
        init_ctx: impl Fn(Context, &O) -> anyhow::Result<Context> + Send + Sync + 'static,
    ) -> Self {
        self.init_ctx = Some(Box::new(init_ctx));
        self
    }
}

impl<O, S, C> ResourceSet<O, S, C> for BasicResourceSet<O, S, C> {
    fn handles(&self, obj: &O) -> bool {
        (self.handles)(obj)
    }

    fn init_ctx(&self, ctx: Context, obj: &O) -> anyhow::Result<Context> {
        match &self.init_ctx {
            Some(init) => init(ctx, obj),
            None => Ok(ctx),
        }
    }

    fn resources(&self) -> &[BoxedResource<O, S, C>] {
        &self.resources
    }
}

pub type BoxedResourceSet<O, S, C> = Box<dyn ResourceSet<O, S, C>>;

/// Maps an observed object to the one resource set that handles it
pub struct ResourceRouter<O, S, C> {
    sets: Vec<BoxedResourceSet<O, S, C>>,
}

impl<O, S, C> ResourceRouter<O, S, C> {
    pub fn new(sets: Vec<BoxedResourceSet<O, S, C>>) -> Result<Self> {
        if sets.is_empty() {
            return Err(Error::InvalidConfig(
                "resource router needs at least one resource set".to_string(),
            ));
        }
        Ok(Self { sets })
    }

    /// Resolve the resource set for `obj`; exactly one must match.
    pub fn resource_set(&self, obj: &O) -> Result<&dyn ResourceSet<O, S, C>> {
        let mut matching = self.sets.iter().filter(|set| set.handles(obj));
        let Some(first) = matching.next() else {
            return Err(Error::NoResourceSet);
        };
        let extra = matching.count();
        if extra > 0 {
            return Err(Error::TooManyResourceSets(extra + 1));
        }
        Ok(first.as_ref())
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
