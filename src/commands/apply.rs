//! One-shot reconciliation passes: `apply` and `delete`

use anyhow::Result;
use std::path::Path;

use super::pass_ctx;
use crate::AppContext;
use crate::config::Config;
use crate::object::PathSet;
use crate::{router, ui};

/// Run a single update pass for the object in `file`
pub fn apply(ctx: &AppContext, config: &Config, file: &Path) -> Result<()> {
    let object = PathSet::load(file)?;
    let router = router::build(config)?;
    let set = router.resource_set(&object)?;

    let pass = pass_ctx(set, &object, "update")?;
    reconcile::process_update(&pass, &object, set.resources())?;

    if !ctx.quiet {
        ui::success(&format!("Reconciled '{}'", object.name()));
    }
    Ok(())
}

/// Run a single delete pass for the object in `file`
pub fn delete(ctx: &AppContext, config: &Config, file: &Path) -> Result<()> {
    let object = PathSet::load(file)?;
    let router = router::build(config)?;
    let set = router.resource_set(&object)?;

    let pass = pass_ctx(set, &object, "delete")?;
    reconcile::process_delete(&pass, &object, set.resources())?;

    if !ctx.quiet {
        ui::success(&format!("Removed entries managed by '{}'", object.name()));
    }
    Ok(())
}
