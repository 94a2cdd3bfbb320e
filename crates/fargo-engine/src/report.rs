//! Structured build report.
//!
//! Enumerates the terminal state of every generator step and compilation
//! unit, carrying captured tool diagnostics for failures. Rendered
//! cargo-style on the terminal and serialisable to JSON.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

use fargo_graph::plan::{BuildPlan, UnitState, Verdict};
use fargo_util::errors::{FargoError, FargoResult};
use fargo_util::progress::{status, status_error, status_warn};

use crate::generate::GeneratedStep;

/// Final state of one compilation unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub path: String,
    pub state: String,
    pub verdict: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// Final state of one generator step.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorReport {
    pub input: String,
    pub outputs: Vec<String>,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// The whole build, one entry per unit and generator step.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub generators: Vec<GeneratorReport>,
    pub units: Vec<UnitReport>,
    pub built: usize,
    pub fresh: usize,
    pub failed: usize,
    pub blocked: usize,
}

impl BuildReport {
    pub fn assemble(
        plan: &BuildPlan,
        steps: &[GeneratedStep],
        diagnostics: &HashMap<PathBuf, String>,
    ) -> BuildReport {
        let generators: Vec<GeneratorReport> = steps
            .iter()
            .map(|s| GeneratorReport {
                input: s.input.display().to_string(),
                outputs: s.outputs.iter().map(|o| o.display().to_string()).collect(),
                state: s.state.to_string(),
                diagnostics: s.diagnostics.clone(),
            })
            .collect();

        let units: Vec<UnitReport> = plan
            .entries()
            .iter()
            .map(|e| UnitReport {
                path: e.path.display().to_string(),
                state: e.state.to_string(),
                verdict: match e.verdict {
                    Verdict::Stale => "stale".to_string(),
                    Verdict::Fresh => "fresh".to_string(),
                },
                diagnostics: diagnostics.get(&e.path).cloned(),
            })
            .collect();

        let failed_steps = steps.iter().filter(|s| s.state == UnitState::Failed).count();

        BuildReport {
            generators,
            units,
            built: plan.count(UnitState::Built)
                + steps.iter().filter(|s| s.state == UnitState::Built).count(),
            fresh: plan.count(UnitState::Fresh)
                + steps.iter().filter(|s| s.state == UnitState::Fresh).count(),
            failed: plan.count(UnitState::Failed) + failed_steps,
            blocked: plan.count(UnitState::Blocked),
        }
    }

    /// `true` iff no unit or generator step is Failed or Blocked. Drives
    /// the process exit code.
    pub fn success(&self) -> bool {
        self.failed == 0 && self.blocked == 0
    }

    /// Render a cargo-style summary to stderr.
    pub fn render(&self) {
        for unit in &self.units {
            match unit.state.as_str() {
                "failed" => {
                    status_error("Failed", &unit.path);
                    if let Some(diag) = &unit.diagnostics {
                        for line in diag.lines() {
                            eprintln!("             {line}");
                        }
                    }
                }
                "blocked" => status_warn("Blocked", &unit.path),
                _ => {}
            }
        }
        for step in &self.generators {
            if step.state == "failed" {
                status_error("Failed", &step.input);
                if let Some(diag) = &step.diagnostics {
                    for line in diag.lines() {
                        eprintln!("             {line}");
                    }
                }
            }
        }
        let summary = format!(
            "{} built, {} fresh, {} failed, {} blocked",
            self.built, self.fresh, self.failed, self.blocked
        );
        if self.success() {
            status("Finished", &summary);
        } else {
            status_error("Finished", &summary);
        }
    }

    pub fn to_json(&self) -> FargoResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            FargoError::Generic {
                message: format!("failed to serialise build report: {e}"),
            }
            .into()
        })
    }
}
