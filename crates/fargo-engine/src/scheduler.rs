//! Build scheduler: staleness verdicts and bounded-concurrency dispatch.
//!
//! Staleness is fingerprint-driven. A unit's fingerprint chains its own
//! source hash, the rendered compile command (including the probed compiler
//! version), and the fingerprints of its direct dependencies; fingerprints
//! are computed in plan order so the chain is transitively sensitive. A
//! rebuilt dependency therefore forces a re-check of dependents, not a
//! blanket rebuild.
//!
//! Dispatch uses a tokio `Semaphore` (worker limit) and a `JoinSet`. An
//! entry is promoted Pending -> Scheduled once every dependency is Fresh or
//! Built, and Scheduled -> Running when a worker permit is free; tool
//! processes run under `spawn_blocking`. A failure marks the unit Failed
//! and its transitive dependents Blocked while independent branches keep
//! running.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use fargo_core::fingerprint::{self, Fingerprint};
use fargo_graph::graph::{DependencyGraph, Unresolved};
use fargo_graph::plan::{BuildPlan, UnitState, Verdict};
use fargo_util::errors::{FargoError, FargoResult};
use fargo_util::fs::ensure_dir;
use fargo_util::progress::status;

use crate::tools::ToolRegistry;

/// Output locations shared by annotation and dispatch.
#[derive(Debug, Clone)]
pub struct BuildPaths {
    /// Fingerprint store, `<project>/.fargo/fingerprints`.
    pub fp_dir: PathBuf,
    /// Object file directory, `<build>/objects`.
    pub obj_dir: PathBuf,
    /// Module/interface artifact directory, `<build>/modules`.
    pub mod_dir: PathBuf,
}

/// Object file path for a unit, flattened by its filename-safe key.
pub fn object_path(paths: &BuildPaths, unit_path: &Path) -> PathBuf {
    paths
        .obj_dir
        .join(format!("{}.o", fingerprint::unit_key(unit_path)))
}

/// Mark units with unresolved requirements Blocked (plus their transitive
/// dependents) and record the reason for the report.
pub fn block_unresolved(
    plan: &mut BuildPlan,
    unresolved: &[Unresolved],
    diagnostics: &mut HashMap<PathBuf, String>,
) {
    for item in unresolved {
        let err = FargoError::UnresolvedSymbol {
            symbol: item.symbol.clone(),
            required_by: item.required_by.clone(),
        };
        diagnostics
            .entry(item.required_by.clone())
            .and_modify(|d| {
                d.push_str("; ");
                d.push_str(&err.to_string());
            })
            .or_insert_with(|| err.to_string());
        plan.mark(&item.required_by, UnitState::Blocked);
    }
    for item in unresolved {
        plan.block_dependents(&item.required_by);
    }
}

/// Compute every unit's current fingerprint (in plan order) and downgrade
/// fingerprint-clean entries to Fresh.
///
/// Returns the fingerprints so dispatch can persist them after successful
/// builds.
pub fn annotate(
    plan: &mut BuildPlan,
    graph: &DependencyGraph,
    registry: &ToolRegistry,
    paths: &BuildPaths,
) -> FargoResult<HashMap<PathBuf, Fingerprint>> {
    let mut current: HashMap<PathBuf, Fingerprint> = HashMap::new();
    let entry_paths: Vec<PathBuf> = plan.entries().iter().map(|e| e.path.clone()).collect();

    for path in entry_paths {
        let unit = graph.unit(&path).ok_or_else(|| FargoError::Generic {
            message: format!("plan entry `{}` has no graph unit", path.display()),
        })?;
        let Some(spec) = registry.compiler_for(unit.source.kind) else {
            // Not compilable; nothing to fingerprint.
            continue;
        };

        let object = object_path(paths, &path);
        let mut tool_line = spec.line(&path, &[object.clone()], &paths.mod_dir);
        if let Some(version) = &registry.compiler_version {
            tool_line.push_str(" [");
            tool_line.push_str(version);
            tool_line.push(']');
        }

        let dep_hashes: Vec<String> = plan
            .entry(&path)
            .map(|e| e.deps.clone())
            .unwrap_or_default()
            .iter()
            .filter_map(|d| current.get(d).map(|fp| fp.hash.clone()))
            .collect();

        let fp = fingerprint::compute(&unit.source.fingerprint, &tool_line, &dep_hashes);
        let key = fingerprint::unit_key(&path);
        let stored = fingerprint::load(&paths.fp_dir, &key);

        let entry = plan
            .entry_mut(&path)
            .expect("annotate only walks plan entries");
        if entry.state == UnitState::Pending && stored.as_ref() == Some(&fp) && object.is_file() {
            entry.verdict = Verdict::Fresh;
            entry.state = UnitState::Fresh;
        } else {
            entry.verdict = Verdict::Stale;
        }
        current.insert(path, fp);
    }
    Ok(current)
}

/// Dispatch all stale entries, respecting dependency order and the worker
/// limit. Returns captured diagnostics for Failed units.
pub async fn execute(
    plan: &mut BuildPlan,
    graph: &DependencyGraph,
    registry: &ToolRegistry,
    paths: &BuildPaths,
    workers: usize,
    fingerprints: &HashMap<PathBuf, Fingerprint>,
) -> FargoResult<HashMap<PathBuf, String>> {
    ensure_dir(&paths.obj_dir).map_err(FargoError::Io)?;
    ensure_dir(&paths.mod_dir).map_err(FargoError::Io)?;

    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut join_set: JoinSet<(PathBuf, Result<(), FargoError>)> = JoinSet::new();
    let mut diagnostics: HashMap<PathBuf, String> = HashMap::new();

    loop {
        // Promote entries whose dependencies have all succeeded.
        let ready: Vec<PathBuf> = plan
            .entries()
            .iter()
            .filter(|e| e.state == UnitState::Pending)
            .filter(|e| {
                e.deps.iter().all(|d| {
                    plan.entry(d)
                        .map(|de| de.state.is_success())
                        // Deps outside the plan (non-compilable) don't gate.
                        .unwrap_or(true)
                })
            })
            .map(|e| e.path.clone())
            .collect();
        for path in ready {
            plan.mark(&path, UnitState::Scheduled);
        }

        // Hand scheduled entries to workers while permits last.
        let scheduled: Vec<PathBuf> = plan
            .entries()
            .iter()
            .filter(|e| e.state == UnitState::Scheduled)
            .map(|e| e.path.clone())
            .collect();
        for path in scheduled {
            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                break;
            };
            let unit = graph.unit(&path).expect("scheduled entry has a unit");
            let Some(spec) = registry.compiler_for(unit.source.kind).cloned() else {
                plan.mark(&path, UnitState::Failed);
                diagnostics.insert(
                    path.clone(),
                    format!("no compiler registered for kind `{}`", unit.source.kind),
                );
                plan.block_dependents(&path);
                continue;
            };

            plan.mark(&path, UnitState::Running);
            status("Compiling", &unit.name());

            let input = path.clone();
            let object = object_path(paths, &path);
            let moddir = paths.mod_dir.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let result = tokio::task::spawn_blocking(move || {
                    spec.invoke(&input, &[object], &moddir).map(|_| ())
                })
                .await
                .unwrap_or_else(|e| {
                    Err(FargoError::Generic {
                        message: format!("compile worker panicked: {e}"),
                    })
                });
                (path, result)
            });
        }

        if join_set.is_empty() {
            break;
        }
        let Some(joined) = join_set.join_next().await else {
            break;
        };
        let (path, result) = joined.map_err(|e| FargoError::Generic {
            message: format!("compile worker join failed: {e}"),
        })?;

        match result {
            Ok(()) => {
                if let Some(fp) = fingerprints.get(&path) {
                    fingerprint::save(&paths.fp_dir, &fingerprint::unit_key(&path), fp)?;
                }
                plan.mark(&path, UnitState::Built);
            }
            Err(err) => {
                let captured = match &err {
                    FargoError::CompileFailure { stderr, .. }
                    | FargoError::GeneratorFailure { stderr, .. } => stderr.clone(),
                    other => other.to_string(),
                };
                tracing::error!(unit = %path.display(), "compile action failed");
                diagnostics.insert(path.clone(), captured);
                plan.mark(&path, UnitState::Failed);
                plan.block_dependents(&path);
            }
        }
    }

    // Anything still pending at this point sits behind a failure that the
    // forward pass could not see yet (e.g. a dep that never left Scheduled).
    let leftovers: Vec<PathBuf> = plan
        .entries()
        .iter()
        .filter(|e| !e.state.is_terminal())
        .map(|e| e.path.clone())
        .collect();
    for path in leftovers {
        plan.mark(&path, UnitState::Blocked);
    }

    Ok(diagnostics)
}
