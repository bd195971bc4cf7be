//! Directory-backed custom resource definition client
//!
//! The definition is stored next to the objects it describes as
//! `<plural>.<group>.crd.toml`.

use anyhow::{Context, Result};
use framework::{CrdClient, CustomResourceDefinition};
use reconcile::{Backoff, retry_notify};
use std::fs;
use std::path::{Path, PathBuf};

pub const CRD_SUFFIX: &str = ".crd.toml";

pub struct DirectoryCrdClient {
    dir: PathBuf,
}

impl DirectoryCrdClient {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn path_for(&self, crd: &CustomResourceDefinition) -> PathBuf {
        self.dir.join(format!("{}{CRD_SUFFIX}", crd.name()))
    }

    fn ensure_once(&self, crd: &CustomResourceDefinition) -> Result<()> {
        let path = self.path_for(crd);

        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Could not read {}", path.display()))?;
            if toml::from_str::<CustomResourceDefinition>(&content).ok().as_ref() == Some(crd) {
                log::debug!("Custom resource definition {} already exists", crd.name());
                return Ok(());
            }
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let content =
            toml::to_string_pretty(crd).context("Failed to serialize resource definition")?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Created custom resource definition {}", crd.name());
        Ok(())
    }
}

impl CrdClient for DirectoryCrdClient {
    fn ensure_created(
        &self,
        crd: &CustomResourceDefinition,
        mut backoff: Box<dyn Backoff>,
    ) -> Result<()> {
        retry_notify(
            &mut *backoff,
            || self.ensure_once(crd),
            |err, delay| {
                log::warn!(
                    "Retrying creation of {} in {delay:?} due to error ({err:#})",
                    crd.name()
                );
            },
        )
    }
}
