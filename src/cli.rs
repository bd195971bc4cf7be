use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "opkit")]
#[command(version)]
#[command(about = "Reconcile PathSet objects into symlinks and managed files", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: <config dir>/opkit.toml)
    #[arg(long, global = true, env = "OPKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory of PathSet objects, overriding the config
    #[arg(long, global = true)]
    pub objects_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Watch the objects directory and reconcile until stopped
    Run,

    /// Reconcile a single object file once
    Apply {
        /// PathSet object file
        file: PathBuf,
    },

    /// Remove the entries an object file manages
    Delete {
        /// PathSet object file
        file: PathBuf,
    },

    /// Show what apply would change
    Diff {
        /// PathSet object file
        file: PathBuf,
    },

    /// Show drift for every object in the objects directory
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
