use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "listprune")]
#[command(about = "Prunes retired entries from managed wiki lists", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the bot configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one pruning pass over every managed list
    Run {
        /// Classify and report, but write nothing
        #[arg(long)]
        dry_run: bool,
    },
}
