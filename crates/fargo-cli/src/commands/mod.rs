//! Command dispatch and handler modules.

mod build;
mod clean;
mod graph;

use miette::Result;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            jobs,
            dry_run,
            report_json,
        } => build::exec(jobs, dry_run, report_json, cli.verbose).await,
        Command::Graph => graph::exec(),
        Command::Clean => clean::exec(),
    }
}
