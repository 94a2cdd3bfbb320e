//! Clean command implementation.

use miette::Result;

use fargo_engine::BuildContext;
use fargo_util::errors::FargoError;

pub fn exec() -> Result<()> {
    let cwd = std::env::current_dir().map_err(FargoError::Io)?;
    let ctx = BuildContext::load(&cwd)?;

    let had_artifacts =
        ctx.build_dir.exists() || ctx.project_root.join(".fargo").exists();
    fargo_engine::clean(&ctx)?;

    if had_artifacts {
        println!("Cleaned build directory");
    } else {
        println!("Nothing to clean");
    }
    Ok(())
}
