//! Custom resource definition descriptor and the client that ensures it

use reconcile::Backoff;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Whether objects of a definition live in a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    Namespaced,
    Cluster,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Namespaced => f.write_str("Namespaced"),
            Scope::Cluster => f.write_str("Cluster"),
        }
    }
}

/// Schema descriptor for the custom objects an operator reconciles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomResourceDefinition {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    #[serde(default)]
    pub scope: Scope,
}

impl CustomResourceDefinition {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            plural: plural.into(),
            scope: Scope::default(),
        }
    }

    /// Fully qualified name, `<plural>.<group>`
    pub fn name(&self) -> String {
        format!("{}.{}", self.plural, self.group)
    }

    /// `<group>/<version>`
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }
}

/// Creates the definition if it does not exist yet
pub trait CrdClient: Send + Sync {
    /// Ensure `crd` exists, retrying under `backoff`
    fn ensure_created(
        &self,
        crd: &CustomResourceDefinition,
        backoff: Box<dyn Backoff>,
    ) -> anyhow::Result<()>;
}

impl<T: CrdClient + ?Sized> CrdClient for Arc<T> {
    fn ensure_created(
        &self,
        crd: &CustomResourceDefinition,
        backoff: Box<dyn Backoff>,
    ) -> anyhow::Result<()> {
        (**self).ensure_created(crd, backoff)
    }
}
