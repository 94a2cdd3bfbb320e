//! Build orchestration for Fargo.
//!
//! Ties the pipeline together: inventory scan -> interface extraction ->
//! generation stage (with graph re-entry) -> dependency resolution ->
//! topological plan -> concurrent dispatch -> report. Graph-construction
//! errors (duplicate definition, cycle) abort before any compile action is
//! dispatched; action failures stay local to the failing unit and its
//! dependents.

pub mod generate;
pub mod report;
pub mod scheduler;
pub mod tools;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fargo_core::config::Manifest;
use fargo_core::extract;
use fargo_core::fingerprint;
use fargo_core::inventory::Inventory;
use fargo_core::source::SourceFile;
use fargo_graph::graph::{DependencyGraph, Unresolved};
use fargo_graph::plan::BuildPlan;
use fargo_graph::unit::CompilationUnit;
use fargo_util::errors::{FargoError, FargoResult};
use fargo_util::fs::remove_dir_if_exists;

use crate::generate::GeneratedStep;
use crate::report::BuildReport;
use crate::scheduler::BuildPaths;
use crate::tools::ToolRegistry;

/// Options for one build invocation.
#[derive(Debug, Default, Clone)]
pub struct BuildOptions {
    /// Worker override; defaults to the manifest's `workers`.
    pub jobs: Option<usize>,
    /// Annotate staleness but dispatch nothing (generators included).
    pub dry_run: bool,
}

/// Everything resolved once per invocation: project root, manifest, and the
/// derived output locations. Passed explicitly into the scheduler; there is
/// no ambient configuration state.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub project_root: PathBuf,
    pub manifest: Manifest,
    pub build_dir: PathBuf,
    pub gen_dir: PathBuf,
    pub paths: BuildPaths,
}

impl BuildContext {
    /// Locate `Fargo.toml` upwards from `start` and derive all paths.
    pub fn load(start: &Path) -> FargoResult<BuildContext> {
        let (project_root, manifest) = Manifest::find_and_load(start)?;
        let build_dir = project_root.join(&manifest.build.build_dir);
        let paths = BuildPaths {
            fp_dir: fingerprint::storage_dir(&project_root),
            obj_dir: build_dir.join("objects"),
            mod_dir: build_dir.join("modules"),
        };
        Ok(BuildContext {
            gen_dir: build_dir.join("generated"),
            project_root,
            manifest,
            build_dir,
            paths,
        })
    }

    fn workers(&self, opts: &BuildOptions) -> usize {
        opts.jobs.unwrap_or(self.manifest.build.workers).max(1)
    }
}

/// The resolved pre-dispatch state of a project, used by `fargo graph` and
/// as the first half of `run_build`.
pub struct Analysis {
    pub inventory: Inventory,
    pub graph: DependencyGraph,
    pub steps: Vec<GeneratedStep>,
    pub unresolved: Vec<Unresolved>,
}

/// Scan, extract, run (or skip, under dry-run) the generation stage, and
/// resolve the dependency graph.
pub fn analyse(ctx: &BuildContext, registry: &ToolRegistry, dry_run: bool) -> FargoResult<Analysis> {
    let mut inventory = Inventory::with_excludes(&ctx.manifest.build.exclude)?;
    for root in &ctx.manifest.build.source_roots {
        let dir = ctx.project_root.join(root);
        if dir.is_dir() {
            let n = inventory.scan(&dir)?;
            tracing::debug!(root = %dir.display(), files = n, "scanned source root");
        } else {
            tracing::warn!(root = %dir.display(), "source root does not exist; skipping");
        }
    }

    let mut graph = DependencyGraph::new();
    let compilable: Vec<SourceFile> = inventory
        .files()
        .filter(|f| f.kind.is_compilable())
        .cloned()
        .collect();
    for file in compilable {
        let unit = if file.kind.is_extractable() {
            let interface = extract::extract(&file).map_err(FargoError::Io)?;
            CompilationUnit::new(file, interface)
        } else {
            CompilationUnit::opaque(file)
        };
        graph.add_unit(unit)?;
    }

    let steps = generate::run_generation_stage(
        &mut inventory,
        &mut graph,
        registry,
        &ctx.paths.fp_dir,
        &ctx.gen_dir,
        dry_run,
    )?;

    let unresolved = graph.resolve();
    Ok(Analysis {
        inventory,
        graph,
        steps,
        unresolved,
    })
}

/// Run the full pipeline and return the structured report.
pub async fn run_build(ctx: &BuildContext, opts: &BuildOptions) -> FargoResult<BuildReport> {
    let mut registry = ToolRegistry::from_manifest(&ctx.manifest);
    if !opts.dry_run {
        registry.probe()?;
    }

    let analysis = analyse(ctx, &registry, opts.dry_run)?;
    let Analysis {
        graph,
        steps,
        unresolved,
        ..
    } = analysis;

    // Cycles abort here, before any compile action is dispatched.
    let mut plan = BuildPlan::from_graph(&graph)?;

    let mut diagnostics: HashMap<PathBuf, String> = HashMap::new();
    scheduler::block_unresolved(&mut plan, &unresolved, &mut diagnostics);
    let fingerprints = scheduler::annotate(&mut plan, &graph, &registry, &ctx.paths)?;

    if !opts.dry_run {
        let workers = ctx.workers(opts);
        let run_diags = scheduler::execute(
            &mut plan,
            &graph,
            &registry,
            &ctx.paths,
            workers,
            &fingerprints,
        )
        .await?;
        diagnostics.extend(run_diags);
    }

    Ok(BuildReport::assemble(&plan, &steps, &diagnostics))
}

/// Delete the build directory and the fingerprint store; the next build
/// starts from a clean slate, as if invoked fresh with no prior state.
pub fn clean(ctx: &BuildContext) -> FargoResult<()> {
    remove_dir_if_exists(&ctx.build_dir).map_err(FargoError::Io)?;
    remove_dir_if_exists(&ctx.project_root.join(".fargo")).map_err(FargoError::Io)?;
    Ok(())
}
