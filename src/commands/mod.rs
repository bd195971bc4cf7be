//! CLI command implementations

pub mod apply;
pub mod diff;
pub mod run;
pub mod status;

use anyhow::Result;
use framework::{COMPONENT, ResourceSet};
use reconcile::{Context, Patch};

use crate::object::{EntrySet, PathSet};

/// What one handler would change for an object
#[derive(Debug)]
pub struct HandlerPlan {
    pub handler: String,
    pub current: EntrySet,
    pub patch: Option<Patch<EntrySet>>,
}

impl HandlerPlan {
    pub fn creates(&self) -> usize {
        self.patch
            .as_ref()
            .and_then(Patch::create_change)
            .map_or(0, EntrySet::len)
    }

    pub fn updates(&self) -> usize {
        self.patch
            .as_ref()
            .and_then(Patch::update_change)
            .map_or(0, EntrySet::len)
    }

    pub fn in_sync(&self) -> bool {
        self.patch.as_ref().is_none_or(Patch::is_empty)
    }
}

/// Pass context for a one-shot command, prepared by the object's resource set
pub fn pass_ctx(
    set: &dyn ResourceSet<PathSet, EntrySet, EntrySet>,
    obj: &PathSet,
    event: &str,
) -> Result<Context> {
    let ctx = Context::background()
        .with_meta("component", COMPONENT)
        .with_meta("event", event);
    set.init_ctx(ctx, obj)
}

/// Compute every handler's update patch without applying anything
pub fn plan(
    set: &dyn ResourceSet<PathSet, EntrySet, EntrySet>,
    obj: &PathSet,
) -> Result<Vec<HandlerPlan>> {
    let ctx = pass_ctx(set, obj, "diff")?;

    set.resources()
        .iter()
        .map(|resource| {
            let current = resource.current_state(&ctx, obj)?;
            let desired = resource.desired_state(&ctx, obj)?;
            let patch = resource.new_update_patch(&ctx, obj, &current, &desired)?;
            Ok(HandlerPlan {
                handler: resource.underlying().name().to_string(),
                current,
                patch,
            })
        })
        .collect()
}
