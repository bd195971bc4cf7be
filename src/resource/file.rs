//! Managed file handler - regular files declared under `spec.files`

use anyhow::{Context as _, Result, bail};
use reconcile::{Context, Patch, Resource};
use std::fs;
use std::path::Path;

use super::{delete_patch, ensure_parent, observe_all, update_patch};
use crate::object::{Entry, EntrySet, PathSet};

pub const NAME: &str = "file";

/// Keeps `spec.files` present with their declared content
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagedFiles;

impl Resource<PathSet, EntrySet, EntrySet> for ManagedFiles {
    fn name(&self) -> &str {
        NAME
    }

    fn current_state(&self, _ctx: &Context, obj: &PathSet) -> Result<EntrySet> {
        observe_all(&obj.desired_files(), |e| matches!(e, Entry::File { .. }))
    }

    fn desired_state(&self, _ctx: &Context, obj: &PathSet) -> Result<EntrySet> {
        Ok(obj.desired_files())
    }

    fn new_update_patch(
        &self,
        _ctx: &Context,
        _obj: &PathSet,
        current: &EntrySet,
        desired: &EntrySet,
    ) -> Result<Option<Patch<EntrySet>>> {
        Ok(update_patch(current, desired))
    }

    fn new_delete_patch(
        &self,
        _ctx: &Context,
        _obj: &PathSet,
        current: &EntrySet,
        desired: &EntrySet,
    ) -> Result<Option<Patch<EntrySet>>> {
        Ok(delete_patch(current, desired))
    }

    fn apply_create_change(&self, ctx: &Context, _obj: &PathSet, change: &EntrySet) -> Result<()> {
        for (path, entry) in change {
            write_file(path, entry)?;
            log::info!("{ctx} created file {}", path.display());
        }
        Ok(())
    }

    fn apply_delete_change(&self, ctx: &Context, _obj: &PathSet, change: &EntrySet) -> Result<()> {
        for path in change.keys() {
            if path.is_symlink() || !path.is_file() {
                continue;
            }
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove file: {}", path.display()))?;
            log::info!("{ctx} removed file {}", path.display());
        }
        Ok(())
    }

    fn apply_update_change(&self, ctx: &Context, _obj: &PathSet, change: &EntrySet) -> Result<()> {
        for (path, entry) in change {
            write_file(path, entry)?;
            log::info!("{ctx} rewrote file {}", path.display());
        }
        Ok(())
    }

    fn underlying(&self) -> &dyn Resource<PathSet, EntrySet, EntrySet> {
        self
    }
}

fn write_file(path: &Path, entry: &Entry) -> Result<()> {
    let Entry::File { content } = entry else {
        bail!(
            "file handler cannot apply {} at {}",
            entry.describe(),
            path.display()
        );
    };

    if path.is_symlink() {
        bail!("Refusing to write through symlink {}", path.display());
    }

    ensure_parent(path)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
