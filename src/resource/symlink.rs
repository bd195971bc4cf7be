//! Symlink handler - links declared under `spec.links`

use anyhow::{Context as _, Result, bail};
use reconcile::{Context, Patch, Resource};
use std::fs;
use std::path::Path;

use super::{delete_patch, ensure_parent, observe_all, update_patch};
use crate::object::{Entry, EntrySet, PathSet};

pub const NAME: &str = "symlink";

/// Keeps `spec.links` pointing at their sources
#[derive(Debug, Clone, Copy, Default)]
pub struct Symlinks;

impl Symlinks {
    fn each_link(
        change: &EntrySet,
        mut f: impl FnMut(&Path, &Path) -> Result<()>,
    ) -> Result<()> {
        for (target, entry) in change {
            match entry {
                Entry::Symlink { source } => f(target, source)?,
                other => bail!(
                    "symlink handler cannot apply {} at {}",
                    other.describe(),
                    target.display()
                ),
            }
        }
        Ok(())
    }
}

impl Resource<PathSet, EntrySet, EntrySet> for Symlinks {
    fn name(&self) -> &str {
        NAME
    }

    fn current_state(&self, _ctx: &Context, obj: &PathSet) -> Result<EntrySet> {
        observe_all(&obj.desired_links(), |e| matches!(e, Entry::Symlink { .. }))
    }

    fn desired_state(&self, _ctx: &Context, obj: &PathSet) -> Result<EntrySet> {
        Ok(obj.desired_links())
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
        Self::each_link(change, |target, source| {
            create_symlink(source, target)?;
            log::info!("{ctx} created symlink {} -> {}", target.display(), source.display());
            Ok(())
        })
    }

    fn apply_delete_change(&self, ctx: &Context, _obj: &PathSet, change: &EntrySet) -> Result<()> {
        for target in change.keys() {
            // Already gone after an earlier attempt
            if !target.is_symlink() {
                continue;
            }
            fs::remove_file(target)
                .with_context(|| format!("Failed to remove symlink: {}", target.display()))?;
            log::info!("{ctx} removed symlink {}", target.display());
        }
        Ok(())
    }

    fn apply_update_change(&self, ctx: &Context, _obj: &PathSet, change: &EntrySet) -> Result<()> {
        Self::each_link(change, |target, source| {
            create_symlink(source, target)?;
            log::info!("{ctx} retargeted symlink {} -> {}", target.display(), source.display());
            Ok(())
        })
    }

    fn underlying(&self) -> &dyn Resource<PathSet, EntrySet, EntrySet> {
        self
    }
}

/// Create or replace the symlink at `target`
fn create_symlink(source: &Path, target: &Path) -> Result<()> {
    if !source.exists() {
        bail!("Source does not exist: {}", source.display());
    }

    ensure_parent(target)?;

    // Replace an existing link, never a regular file
    if target.is_symlink() {
        fs::remove_file(target)
            .with_context(|| format!("Failed to remove existing symlink: {}", target.display()))?;
    } else if target.exists() {
        bail!("Refusing to replace {} with a symlink", target.display());
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(source, target).with_context(|| {
        format!(
            "Failed to create symlink: {} -> {}",
            target.display(),
            source.display()
        )
    })?;

    #[cfg(windows)]
    {
        use std::os::windows::fs::{symlink_dir, symlink_file};

        if source.is_dir() {
            // Junctions work without admin privileges
            if let Err(e) = junction::create(source, target) {
                log::debug!("Junction creation failed ({e}), trying symlink_dir");
                symlink_dir(source, target).with_context(|| {
                    format!(
                        "Failed to create directory symlink: {} -> {}",
                        target.display(),
                        source.display()
                    )
                })?;
            }
        } else {
            symlink_file(source, target).with_context(|| {
                format!(
                    "Failed to create file symlink: {} -> {}",
                    target.display(),
                    source.display()
                )
            })?;
        }
    }

    #[cfg(not(any(unix, windows)))]
    bail!("Symlinks not supported on this platform");

    Ok(())
}
