//! Handlers reconciling `PathSet` objects
//!
//! Each handler owns one kind of entry under the object's root:
//! - `symlink` - links pointing at a declared source
//! - `file` - regular files with declared content
//!
//! Both use [`EntrySet`] as state and change type, so they share the patch
//! computation below. A path occupied by something the handler does not
//! manage is left alone.

use crate::object::{Entry, EntrySet, PathSet};
use anyhow::{Context, Result};
use reconcile::{BoxedResource, Patch};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub mod file;
pub mod symlink;

pub use file::ManagedFiles;
pub use symlink::Symlinks;

pub type Handler = BoxedResource<PathSet, EntrySet, EntrySet>;

/// The handler chain for a PathSet, in reconciliation order
pub fn handlers() -> Vec<Handler> {
    vec![Box::new(Symlinks), Box::new(ManagedFiles)]
}

/// Create what is missing, update what differs
pub fn update_patch(current: &EntrySet, desired: &EntrySet) -> Option<Patch<EntrySet>> {
    let mut create = EntrySet::new();
    let mut update = EntrySet::new();

    for (path, want) in desired {
        match current.get(path) {
            None => {
                create.insert(path.clone(), want.clone());
            }
            Some(have) if have == want => {}
            Some(have) if have.is_other() => {
                log::warn!(
                    "{} is occupied by {}, leaving it alone",
                    path.display(),
                    have.describe()
                );
            }
            Some(_) => {
                update.insert(path.clone(), want.clone());
            }
        }
    }

    let mut patch = Patch::new();
    if !create.is_empty() {
        patch.set_create_change(create);
    }
    if !update.is_empty() {
        patch.set_update_change(update);
    }
    (!patch.is_empty()).then_some(patch)
}

/// Delete every declared entry that is still present
pub fn delete_patch(current: &EntrySet, desired: &EntrySet) -> Option<Patch<EntrySet>> {
    let delete: EntrySet = current
        .iter()
        .filter(|(path, have)| desired.contains_key(*path) && !have.is_other())
        .map(|(path, have)| (path.clone(), have.clone()))
        .collect();

    (!delete.is_empty()).then(|| Patch::new().with_delete(delete))
}

/// What occupies `path`, without following a final symlink
pub fn observe(path: &Path) -> Result<Option<Entry>> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to inspect {}", path.display()));
        }
    };

    let file_type = metadata.file_type();
    let entry = if file_type.is_symlink() {
        let target = fs::read_link(path)
            .with_context(|| format!("Failed to read symlink {}", path.display()))?;
        let source = match path.parent() {
            Some(parent) if target.is_relative() => parent.join(target),
            _ => target,
        };
        Entry::Symlink { source }
    } else if file_type.is_file() {
        match fs::read_to_string(path) {
            Ok(content) => Entry::File { content },
            Err(e) if e.kind() == ErrorKind::InvalidData => Entry::Other {
                description: "binary file".to_string(),
            },
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        }
    } else if file_type.is_dir() {
        Entry::Other {
            description: "directory".to_string(),
        }
    } else {
        Entry::Other {
            description: "special file".to_string(),
        }
    };

    Ok(Some(entry))
}

/// Observe every desired path, keeping only the occupied ones
///
/// `manages` decides whether an observed entry is of the handler's kind;
/// anything else is reported as [`Entry::Other`].
pub fn observe_all(desired: &EntrySet, manages: impl Fn(&Entry) -> bool) -> Result<EntrySet> {
    let mut current = EntrySet::new();
    for path in desired.keys() {
        let Some(entry) = observe(path)? else {
            continue;
        };
        let entry = if manages(&entry) || entry.is_other() {
            entry
        } else {
            Entry::Other {
                description: entry.describe(),
            }
        };
        current.insert(path.clone(), entry);
    }
    Ok(current)
}

/// Create the parent directory of `path` if needed
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {}", parent.display()))?;
    }
    Ok(())
}
