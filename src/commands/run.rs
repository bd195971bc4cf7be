//! `opkit run` - boot the operator and reconcile until it fails

use anyhow::{Context, Result, bail};
use framework::{Framework, Shutdown};
use std::fs;

use crate::AppContext;
use crate::config::Config;
use crate::crd::DirectoryCrdClient;
use crate::informer::DirectoryInformer;
use crate::object::{EntrySet, PathSet};
use crate::{router, ui};

pub type Operator = Framework<PathSet, EntrySet, EntrySet>;

/// Wire the directory informer, CRD client and router into a framework
pub fn build(config: &Config) -> Result<Operator> {
    let dir = config.objects_dir()?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create objects dir: {}", dir.display()))?;

    let (crd, crd_client) = if config.operator.ensure_crd {
        (
            Some(router::crd()),
            Some(Box::new(DirectoryCrdClient::new(&dir)) as Box<dyn framework::CrdClient>),
        )
    } else {
        (None, None)
    };

    let operator = Framework::new(framework::Config {
        crd,
        crd_client,
        informer: Some(Box::new(DirectoryInformer::new(
            &dir,
            config.poll_interval(),
            config.resync_interval(),
        ))),
        resource_router: Some(router::build(config)?),
        backoff_factory: Some(config.backoff.factory()),
    })?;
    Ok(operator)
}

pub fn run(ctx: &AppContext, config: &Config) -> Result<()> {
    let operator = build(config)?;

    if !ctx.quiet {
        ui::info(&format!(
            "Watching {} (press Ctrl-C to stop)",
            config.objects_dir()?.display()
        ));
    }

    // Blocks for as long as the event loop runs
    if let Err(fatal) = operator.boot(&Shutdown::new()) {
        ui::error(&format!("Operator stopped: {fatal}"));
        bail!(fatal);
    }
    Ok(())
}
