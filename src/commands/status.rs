//! Report drift for every object in the objects directory

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use super::plan;
use crate::config::Config;
use crate::informer;
use crate::object::PathSet;
use crate::router::{self, PathSetRouter};
use crate::ui;

#[derive(Debug, Serialize)]
pub struct ObjectStatus {
    pub file: String,
    pub name: Option<String>,
    pub in_sync: bool,
    pub handlers: Vec<HandlerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HandlerStatus {
    pub handler: String,
    pub creates: usize,
    pub updates: usize,
}

pub fn run(config: &Config, json: bool) -> Result<()> {
    let dir = config.objects_dir()?;
    let statuses = collect(config, &dir)?;

    if json {
        let out = serde_json::to_string_pretty(&statuses).context("Failed to serialize status")?;
        println!("{out}");
        return Ok(());
    }

    ui::header("Operator Status");
    ui::kv("Objects dir", &dir.display().to_string());

    if statuses.is_empty() {
        println!();
        ui::dim("No objects found");
        return Ok(());
    }

    ui::section("Objects");
    for status in &statuses {
        show(status);
    }

    let drifted = statuses.iter().filter(|s| !s.in_sync).count();
    println!();
    if drifted == 0 {
        ui::success("All objects in sync");
    } else {
        ui::warn(&format!("{drifted} {} out of sync", ui::plural(drifted, "object", "objects")));
    }
    Ok(())
}

/// Plan every object under `dir`; per-object failures are reported, not returned
pub fn collect(config: &Config, dir: &Path) -> Result<Vec<ObjectStatus>> {
    let router = router::build(config)?;

    Ok(informer::scan(dir)?
        .into_iter()
        .map(|(path, scanned)| {
            let file = path.display().to_string();
            match scanned.object {
                Some(object) => object_status(&router, file, &object),
                None => ObjectStatus {
                    file,
                    name: None,
                    in_sync: false,
                    handlers: Vec::new(),
                    error: Some("not a valid PathSet".to_string()),
                },
            }
        })
        .collect())
}

fn object_status(router: &PathSetRouter, file: String, object: &PathSet) -> ObjectStatus {
    let planned = router
        .resource_set(object)
        .map_err(anyhow::Error::from)
        .and_then(|set| plan(set, object));

    match planned {
        Ok(plans) => ObjectStatus {
            file,
            name: Some(object.name().to_string()),
            in_sync: plans.iter().all(super::HandlerPlan::in_sync),
            handlers: plans
                .iter()
                .map(|p| HandlerStatus {
                    handler: p.handler.clone(),
                    creates: p.creates(),
                    updates: p.updates(),
                })
                .collect(),
            error: None,
        },
        Err(e) => ObjectStatus {
            file,
            name: Some(object.name().to_string()),
            in_sync: false,
            handlers: Vec::new(),
            error: Some(format!("{e:#}")),
        },
    }
}

fn show(status: &ObjectStatus) {
    let name = status.name.as_deref().unwrap_or(&status.file);

    if let Some(error) = &status.error {
        println!("  {} {} {}", "✗".red(), name, error.dimmed());
        return;
    }
    if status.in_sync {
        println!("  {} {}", "✓".green(), name);
        return;
    }

    let pending: Vec<String> = status
        .handlers
        .iter()
        .filter(|h| h.creates + h.updates > 0)
        .map(|h| format!("{}: +{} ~{}", h.handler, h.creates, h.updates))
        .collect();
    println!("  {} {} {}", "⚠".yellow(), name, pending.join(", ").dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn object_toml(name: &str, root: &Path, content: &str) -> String {
        format!(
            r#"
api_version = "opkit.dev/v1"
kind = "PathSet"

[metadata]
name = "{name}"

[spec]
root = "{}"

[[spec.files]]
path = "motd"
content = "{content}"
"#,
            root.display()
        )
    }

    #[test]
    fn test_collect_reports_drift() {
        let dir = TempDir::new().unwrap();
        let objects = dir.path().join("objects");
        let synced = dir.path().join("synced");
        let drifted = dir.path().join("drifted");
        fs::create_dir_all(&objects).unwrap();
        fs::create_dir_all(&synced).unwrap();
        fs::write(synced.join("motd"), "hi").unwrap();

        fs::write(objects.join("a.toml"), object_toml("a", &synced, "hi")).unwrap();
        fs::write(objects.join("b.toml"), object_toml("b", &drifted, "hi")).unwrap();
        fs::write(objects.join("c.toml"), "kind = 1").unwrap();

        let statuses = collect(&Config::default(), &objects).unwrap();

        assert_eq!(statuses.len(), 3);
        assert!(statuses[0].in_sync);
        assert_eq!(statuses[0].name.as_deref(), Some("a"));

        assert!(!statuses[1].in_sync);
        let file = statuses[1].handlers.iter().find(|h| h.handler == "file").unwrap();
        assert_eq!((file.creates, file.updates), (1, 0));

        assert!(statuses[2].error.is_some());

        let json = serde_json::to_value(&statuses).unwrap();
        assert_eq!(json[0]["in_sync"], true);
        assert!(json[0].get("error").is_none());
    }
}
