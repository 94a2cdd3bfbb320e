//! Generation stage resolver.
//!
//! Generator-input sources cannot be compiled directly: the PSyKAl `.x90`
//! algorithm files go through the code generator (one input, two outputs:
//! the rewritten algorithm source and the PSy layer), and `.pf` test specs
//! go through the test-framework processor (one input, one output). The
//! produced files re-enter the inventory and extractor, then the dependency
//! graph is updated incrementally.
//!
//! A step is skipped as fresh iff all declared outputs exist, each is newer
//! than the input, and the stored step fingerprint (input content + rendered
//! command line + probed generator version) is unchanged. If any output is
//! stale or missing the whole step re-runs and rewrites every declared
//! output; generators are atomic.

use std::path::{Path, PathBuf};

use fargo_core::extract;
use fargo_core::fingerprint::{self, Fingerprint};
use fargo_core::inventory::Inventory;
use fargo_core::source::{SourceFile, SourceKind};
use fargo_graph::graph::DependencyGraph;
use fargo_graph::plan::UnitState;
use fargo_util::errors::{FargoError, FargoResult};
use fargo_util::fs::{ensure_dir, mtime_secs};
use fargo_util::progress::status;

use crate::tools::ToolRegistry;

/// Outcome of one generator step, for the build report.
#[derive(Debug, Clone)]
pub struct GeneratedStep {
    pub input: PathBuf,
    pub outputs: Vec<PathBuf>,
    /// Fresh (skipped), Built, Failed, or Pending under `--dry-run`.
    pub state: UnitState,
    /// Captured stderr for Failed steps.
    pub diagnostics: Option<String>,
}

/// Declared outputs for a generator-input file, with the kind each output
/// re-enters extraction as. Output order matches the tool template's
/// `{output}` placeholders.
pub fn declared_outputs(source: &SourceFile, gen_dir: &Path) -> Vec<(PathBuf, SourceKind)> {
    let stem = source.stem();
    match source.kind {
        SourceKind::PsykalAlgorithm => vec![
            (gen_dir.join(format!("{stem}_psy.f90")), SourceKind::FortranFree),
            (gen_dir.join(format!("{stem}_alg.f90")), SourceKind::FortranFree),
        ],
        SourceKind::TestSpec => vec![(gen_dir.join(format!("{stem}.F90")), SourceKind::FortranFree)],
        _ => Vec::new(),
    }
}

/// Run every pending generator step, feeding produced sources back into the
/// inventory and graph.
///
/// A failing generator does not abort the stage: its outputs stay missing,
/// so units requiring them surface as unresolved symbols and are blocked,
/// while independent subgraphs build on. Duplicate definitions introduced
/// by generated code are fatal, like any other graph-construction error.
pub fn run_generation_stage(
    inventory: &mut Inventory,
    graph: &mut DependencyGraph,
    registry: &ToolRegistry,
    fp_dir: &Path,
    gen_dir: &Path,
    dry_run: bool,
) -> FargoResult<Vec<GeneratedStep>> {
    let inputs: Vec<SourceFile> = inventory
        .files()
        .filter(|f| f.kind.is_generator_input())
        .cloned()
        .collect();
    let mut steps = Vec::with_capacity(inputs.len());

    for input in inputs {
        let spec = registry
            .generator_for(input.kind)
            .ok_or_else(|| FargoError::Config {
                message: format!("no generator registered for kind `{}`", input.kind),
            })?;
        let outputs = declared_outputs(&input, gen_dir);
        let output_paths: Vec<PathBuf> = outputs.iter().map(|(p, _)| p.clone()).collect();

        let mut tool_line = spec.line(&input.path, &output_paths, gen_dir);
        if let Some(version) = registry.generator_version(input.kind) {
            tool_line.push_str(" [");
            tool_line.push_str(version);
            tool_line.push(']');
        }
        let current = step_fingerprint(&input, &tool_line);
        let key = format!("gen__{}", fingerprint::unit_key(&input.path));

        let fresh = outputs_fresh(&input, &output_paths)
            && fingerprint::load(fp_dir, &key).as_ref() == Some(&current);

        let state = if fresh {
            UnitState::Fresh
        } else if dry_run {
            UnitState::Pending
        } else {
            status("Generating", &input.path.display().to_string());
            ensure_dir(gen_dir).map_err(FargoError::Io)?;
            match spec.invoke(&input.path, &output_paths, gen_dir) {
                Ok(_) => {
                    fingerprint::save(fp_dir, &key, &current)?;
                    UnitState::Built
                }
                Err(err) => {
                    let diagnostics = match &err {
                        FargoError::GeneratorFailure { stderr, .. } => stderr.clone(),
                        other => other.to_string(),
                    };
                    tracing::error!(input = %input.path.display(), "generator step failed");
                    steps.push(GeneratedStep {
                        input: input.path.clone(),
                        outputs: output_paths,
                        state: UnitState::Failed,
                        diagnostics: Some(diagnostics),
                    });
                    continue;
                }
            }
        };

        // Re-register declared outputs that exist, extract their interfaces,
        // and grow the graph; resolution happens incrementally afterwards.
        for (path, kind) in &outputs {
            if !path.is_file() {
                continue;
            }
            inventory.register(path)?;
            let file = SourceFile::scan(path, *kind).map_err(FargoError::Io)?;
            let unit = if kind.is_extractable() {
                let interface = extract::extract(&file).map_err(FargoError::Io)?;
                fargo_graph::unit::CompilationUnit::new(file, interface)
            } else {
                fargo_graph::unit::CompilationUnit::opaque(file)
            };
            graph.add_unit(unit)?;
        }

        steps.push(GeneratedStep {
            input: input.path.clone(),
            outputs: output_paths,
            state,
            diagnostics: None,
        });
    }

    Ok(steps)
}

/// Every declared output exists and is at least as new as the input.
fn outputs_fresh(input: &SourceFile, outputs: &[PathBuf]) -> bool {
    outputs
        .iter()
        .all(|out| out.is_file() && mtime_secs(out) >= input.mtime)
}

fn step_fingerprint(input: &SourceFile, tool_line: &str) -> Fingerprint {
    fingerprint::compute(&input.fingerprint, tool_line, &[])
}
