//! Build command implementation.

use miette::Result;

use fargo_engine::{run_build, BuildContext, BuildOptions};
use fargo_util::errors::FargoError;

pub async fn exec(jobs: Option<usize>, dry_run: bool, report_json: bool, verbose: bool) -> Result<()> {
    let cwd = std::env::current_dir().map_err(FargoError::Io)?;
    let ctx = BuildContext::load(&cwd)?;
    tracing::debug!(root = %ctx.project_root.display(), "resolved project root");

    let opts = BuildOptions { jobs, dry_run };
    let report = run_build(&ctx, &opts).await?;

    if report_json {
        println!("{}", report.to_json()?);
    } else {
        if verbose {
            for unit in &report.units {
                eprintln!("{:>10}  {} ({})", unit.state, unit.path, unit.verdict);
            }
        }
        report.render();
    }

    if !report.success() {
        std::process::exit(1);
    }
    Ok(())
}
