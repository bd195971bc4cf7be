mod cli;
mod commands;
mod config;
mod crd;
mod informer;
mod object;
mod paths;
mod resource;
mod router;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct AppContext {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .parse_default_env()
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "opkit", &mut io::stdout());
        return Ok(());
    }

    let ctx = AppContext {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.objects_dir {
        config.operator.objects_dir = Some(dir.display().to_string());
    }

    match cli.command {
        Command::Run => commands::run::run(&ctx, &config),
        Command::Apply { file } => commands::apply::apply(&ctx, &config, &file),
        Command::Delete { file } => commands::apply::delete(&ctx, &config, &file),
        Command::Diff { file } => commands::diff::run(&ctx, &config, &file),
        Command::Status { json } => commands::status::run(&config, json),
        Command::Completions { .. } => Ok(()),
    }
}
