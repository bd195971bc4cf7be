//! The `PathSet` custom object and the entry model its handlers share
//!
//! A PathSet declares a root directory plus the symlinks and managed files
//! that should exist under it:
//!
//! ```toml
//! api_version = "opkit.dev/v1"
//! kind = "PathSet"
//!
//! [metadata]
//! name = "dotfiles"
//!
//! [spec]
//! root = "~/sandbox"
//!
//! [[spec.links]]
//! path = "bin/tool"
//! source = "~/src/tool/target/release/tool"
//!
//! [[spec.files]]
//! path = "etc/motd"
//! content = "hello\n"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const GROUP: &str = "opkit.dev";
pub const VERSION: &str = "v1";
pub const KIND: &str = "PathSet";
pub const PLURAL: &str = "pathsets";

/// `<group>/<version>` accepted in `api_version`
pub fn api_version() -> String {
    format!("{GROUP}/{VERSION}")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectError {
    #[error("unsupported object {api_version}/{kind}")]
    Unsupported { api_version: String, kind: String },

    #[error("metadata.name must not be empty")]
    MissingName,

    #[error("spec.root must not be empty")]
    MissingRoot,

    #[error("path '{0}' must be relative and stay inside spec.root")]
    EscapingPath(String),

    #[error("path '{0}' is declared more than once")]
    DuplicatePath(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSet {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: PathSetSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    /// Content fingerprint, set by the informer when the object is observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSetSpec {
    pub root: String,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub files: Vec<FileSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    /// Link location, relative to the root
    pub path: String,
    /// What the link points to; relative sources resolve against the root
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

impl PathSet {
    pub fn from_toml(content: &str) -> Result<Self> {
        let object: Self = toml::from_str(content).context("Invalid PathSet TOML")?;
        object.validate()?;
        Ok(object)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read object file: {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid object: {}", path.display()))
    }

    pub fn validate(&self) -> std::result::Result<(), ObjectError> {
        if !self.is_supported() {
            return Err(ObjectError::Unsupported {
                api_version: self.api_version.clone(),
                kind: self.kind.clone(),
            });
        }
        if self.metadata.name.trim().is_empty() {
            return Err(ObjectError::MissingName);
        }
        if self.spec.root.trim().is_empty() {
            return Err(ObjectError::MissingRoot);
        }

        let mut seen = std::collections::HashSet::new();
        let declared = self
            .spec
            .links
            .iter()
            .map(|l| &l.path)
            .chain(self.spec.files.iter().map(|f| &f.path));
        for path in declared {
            if !is_contained(Path::new(path)) {
                return Err(ObjectError::EscapingPath(path.clone()));
            }
            if !seen.insert(path.as_str()) {
                return Err(ObjectError::DuplicatePath(path.clone()));
            }
        }
        Ok(())
    }

    pub fn is_supported(&self) -> bool {
        self.api_version == api_version() && self.kind == KIND
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Expanded root directory
    pub fn root(&self) -> PathBuf {
        crate::paths::expand(&self.spec.root)
    }

    /// Desired symlinks keyed by absolute link path
    pub fn desired_links(&self) -> EntrySet {
        let root = self.root();
        self.spec
            .links
            .iter()
            .map(|link| {
                let source = crate::paths::expand(&link.source);
                let source = if source.is_absolute() {
                    source
                } else {
                    root.join(source)
                };
                (root.join(&link.path), Entry::Symlink { source })
            })
            .collect()
    }

    /// Desired managed files keyed by absolute path
    pub fn desired_files(&self) -> EntrySet {
        let root = self.root();
        self.spec
            .files
            .iter()
            .map(|file| {
                (
                    root.join(&file.path),
                    Entry::File {
                        content: file.content.clone(),
                    },
                )
            })
            .collect()
    }
}

fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// What occupies (or should occupy) one path on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    Symlink { source: PathBuf },
    File { content: String },
    /// Something the handler does not manage, e.g. a directory
    Other { description: String },
}

impl Entry {
    pub fn is_other(&self) -> bool {
        matches!(self, Entry::Other { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Entry::Symlink { source } => format!("symlink -> {}", source.display()),
            Entry::File { content } => format!("file ({} bytes)", content.len()),
            Entry::Other { description } => description.clone(),
        }
    }
}

/// Entries keyed by absolute path; handler state and change type
pub type EntrySet = BTreeMap<PathBuf, Entry>;
