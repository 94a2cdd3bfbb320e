//! CLI argument definitions for Fargo.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "fargo",
    version,
    about = "A dependency-aware build orchestrator for Fortran codebases",
    long_about = "Fargo scans Fortran source trees, extracts module interfaces, runs code \
                  generators for PSyKAl algorithm files and pFUnit test specs, and compiles \
                  everything concurrently in dependency order, rebuilding only what changed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the project
    Build {
        /// Worker limit for concurrent tool invocations
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Plan and annotate staleness without running any tool
        #[arg(long)]
        dry_run: bool,
        /// Print the build report as JSON on stdout
        #[arg(long)]
        report_json: bool,
    },

    /// Print the dependency graph in build order
    Graph,

    /// Remove build artifacts and cached fingerprints
    Clean,
}

pub fn parse() -> Cli {
    Cli::parse()
}
