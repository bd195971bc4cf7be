//! Show what an `apply` would change, without changing anything

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use super::{HandlerPlan, plan};
use crate::AppContext;
use crate::config::Config;
use crate::object::{Entry, PathSet};
use crate::{router, ui};

pub fn run(ctx: &AppContext, config: &Config, file: &Path) -> Result<()> {
    let object = PathSet::load(file)?;
    let router = router::build(config)?;
    let set = router.resource_set(&object)?;
    let plans = plan(set, &object)?;

    ui::header(&format!("Diff: {}", object.name()));

    if plans.iter().all(HandlerPlan::in_sync) {
        println!();
        ui::success("Everything is in sync");
        return Ok(());
    }

    for handler in &plans {
        show_plan(ctx, handler);
    }
    println!();
    Ok(())
}

fn show_plan(ctx: &AppContext, handler: &HandlerPlan) {
    let Some(patch) = &handler.patch else {
        return;
    };
    if patch.is_empty() {
        return;
    }

    ui::section(&handler.handler);

    if let Some(create) = patch.create_change() {
        for (path, entry) in create {
            println!("  {} {}", "+".green(), path.display());
            if ctx.verbose > 0 {
                ui::dim(&entry.describe());
            }
        }
    }

    if let Some(update) = patch.update_change() {
        for (path, desired) in update {
            println!("  {} {}", "~".yellow(), path.display());
            show_change(handler.current.get(path), desired);
        }
    }
}

fn show_change(current: Option<&Entry>, desired: &Entry) {
    match (current, desired) {
        (Some(Entry::File { content: old }), Entry::File { content: new }) => {
            show_text_diff(old, new);
        }
        (Some(Entry::Symlink { source: old }), Entry::Symlink { source: new }) => {
            println!(
                "    {} {} {}",
                old.display().to_string().red(),
                "->".dimmed(),
                new.display().to_string().green()
            );
        }
        (Some(current), desired) => {
            println!(
                "    {} {} {}",
                current.describe().red(),
                "->".dimmed(),
                desired.describe().green()
            );
        }
        (None, _) => {}
    }
}

fn show_text_diff(old: &str, new: &str) {
    let diff = similar::TextDiff::from_lines(old, new);

    for change in diff.iter_all_changes() {
        let line = change.to_string_lossy();
        let line = line.trim_end_matches('\n');
        match change.tag() {
            similar::ChangeTag::Delete => println!("    {}", format!("- {line}").red()),
            similar::ChangeTag::Insert => println!("    {}", format!("+ {line}").green()),
            similar::ChangeTag::Equal => {}
        }
    }
}
