//! Graph command: print the resolved dependency graph in build order.
//!
//! Runs the analysis half of the pipeline with generators in dry-run mode,
//! so nothing is executed and no artifacts are written.

use miette::Result;

use fargo_engine::tools::ToolRegistry;
use fargo_engine::{analyse, BuildContext};
use fargo_util::errors::FargoError;

pub fn exec() -> Result<()> {
    let cwd = std::env::current_dir().map_err(FargoError::Io)?;
    let ctx = BuildContext::load(&cwd)?;
    let registry = ToolRegistry::from_manifest(&ctx.manifest);
    let analysis = analyse(&ctx, &registry, true)?;

    for unit in analysis.graph.topological_order()? {
        println!("{}", unit.path().display());
        for symbol in &unit.defines {
            println!("  defines {symbol}");
        }
        for dep in analysis.graph.dependencies_of(unit.path()) {
            println!("  uses    {}", dep.path().display());
        }
    }

    for item in &analysis.unresolved {
        eprintln!(
            "warning: unresolved module `{}` required by `{}`",
            item.symbol,
            item.required_by.display()
        );
    }
    Ok(())
}
