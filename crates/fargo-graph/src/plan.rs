//! Build plans: the staleness-annotated, topologically ordered schedule.
//!
//! A plan is recomputed from the graph and the filesystem on every build
//! invocation; nothing about it is persisted across runs except the
//! fingerprints of emitted artifacts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fargo_util::errors::FargoError;

use crate::graph::DependencyGraph;

/// Lifecycle of one plan entry.
///
/// `Pending -> {Fresh | Scheduled -> Running -> {Built | Failed}} -> Blocked`
/// where Blocked applies when an ancestor failed or has an unresolved
/// requirement. Terminal states: Fresh, Built, Failed, Blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Fresh,
    Scheduled,
    Running,
    Built,
    Failed,
    Blocked,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UnitState::Fresh | UnitState::Built | UnitState::Failed | UnitState::Blocked
        )
    }

    /// Terminal and usable by dependents.
    pub fn is_success(self) -> bool {
        matches!(self, UnitState::Fresh | UnitState::Built)
    }
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UnitState::Pending => "pending",
            UnitState::Fresh => "fresh",
            UnitState::Scheduled => "scheduled",
            UnitState::Running => "running",
            UnitState::Built => "built",
            UnitState::Failed => "failed",
            UnitState::Blocked => "blocked",
        };
        f.write_str(name)
    }
}

/// Stale/fresh verdict, decided by fingerprint comparison before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Stale,
    Fresh,
}

/// One scheduled compilation, in topological position.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub path: PathBuf,
    /// Direct dependency unit paths (all earlier in the plan).
    pub deps: Vec<PathBuf>,
    pub verdict: Verdict,
    pub state: UnitState,
}

/// An ordered sequence of compilation entries consistent with a topological
/// sort of the dependency graph.
#[derive(Debug, Default)]
pub struct BuildPlan {
    entries: Vec<PlanEntry>,
    index: HashMap<PathBuf, usize>,
}

impl BuildPlan {
    /// Derive a plan from a resolved graph. Entries start `Pending` and
    /// `Stale`; the scheduler downgrades fingerprint-clean entries to
    /// `Fresh` before dispatch. Fails on a cyclic graph.
    pub fn from_graph(graph: &DependencyGraph) -> Result<BuildPlan, FargoError> {
        let order = graph.topological_order()?;
        let mut plan = BuildPlan::default();
        for unit in order {
            let deps = graph
                .dependencies_of(unit.path())
                .iter()
                .map(|d| d.path().to_path_buf())
                .collect();
            plan.push(PlanEntry {
                path: unit.path().to_path_buf(),
                deps,
                verdict: Verdict::Stale,
                state: UnitState::Pending,
            });
        }
        Ok(plan)
    }

    fn push(&mut self, entry: PlanEntry) {
        self.index.insert(entry.path.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn entry(&self, path: &Path) -> Option<&PlanEntry> {
        self.index.get(path).map(|&i| &self.entries[i])
    }

    pub fn entry_mut(&mut self, path: &Path) -> Option<&mut PlanEntry> {
        self.index.get(path).copied().map(move |i| &mut self.entries[i])
    }

    pub fn mark(&mut self, path: &Path, state: UnitState) {
        if let Some(entry) = self.entry_mut(path) {
            entry.state = state;
        }
    }

    /// Mark every transitive dependent of `path` as Blocked.
    ///
    /// Entries are in topological order, so one forward pass suffices:
    /// a dependent is blocked if any of its deps is Failed or Blocked.
    pub fn block_dependents(&mut self, path: &Path) {
        let Some(&start) = self.index.get(path) else {
            return;
        };
        for i in (start + 1)..self.entries.len() {
            if self.entries[i].state.is_terminal() {
                continue;
            }
            let blocked = self.entries[i].deps.iter().any(|d| {
                self.index
                    .get(d)
                    .map(|&j| {
                        matches!(self.entries[j].state, UnitState::Failed | UnitState::Blocked)
                    })
                    .unwrap_or(false)
            });
            if blocked {
                self.entries[i].state = UnitState::Blocked;
            }
        }
    }

    /// Count entries currently in `state`.
    pub fn count(&self, state: UnitState) -> usize {
        self.entries.iter().filter(|e| e.state == state).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` once every entry has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.state.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::CompilationUnit;
    use fargo_core::extract::Interface;
    use fargo_core::source::{SourceFile, SourceKind};
    use std::collections::BTreeSet;

    fn unit(path: &str, defines: &[&str], requires: &[&str]) -> CompilationUnit {
        let source = SourceFile {
            path: PathBuf::from(path),
            kind: SourceKind::FortranFree,
            fingerprint: format!("fp-{path}"),
            mtime: 0,
        };
        CompilationUnit::new(
            source,
            Interface {
                defines: defines.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
                requires: requires.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            },
        )
    }

    fn diamond() -> BuildPlan {
        let mut g = DependencyGraph::new();
        g.add_unit(unit("a.f90", &["a"], &[])).unwrap();
        g.add_unit(unit("b.f90", &["b"], &["a"])).unwrap();
        g.add_unit(unit("c.f90", &["c"], &["a"])).unwrap();
        g.add_unit(unit("d.f90", &[], &["b", "c"])).unwrap();
        assert!(g.resolve().is_empty());
        BuildPlan::from_graph(&g).unwrap()
    }

    #[test]
    fn plan_is_topologically_ordered() {
        let plan = diamond();
        let paths: Vec<&str> = plan
            .entries()
            .iter()
            .map(|e| e.path.to_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["a.f90", "b.f90", "c.f90", "d.f90"]);
        assert!(plan.entry(Path::new("d.f90")).unwrap().deps.len() == 2);
    }

    #[test]
    fn blocking_propagates_transitively_but_not_sideways() {
        let mut plan = diamond();
        plan.mark(Path::new("a.f90"), UnitState::Built);
        plan.mark(Path::new("b.f90"), UnitState::Failed);
        plan.block_dependents(Path::new("b.f90"));

        assert_eq!(plan.entry(Path::new("d.f90")).unwrap().state, UnitState::Blocked);
        // c depends only on a; it must stay schedulable.
        assert_eq!(plan.entry(Path::new("c.f90")).unwrap().state, UnitState::Pending);
    }

    #[test]
    fn complete_when_all_terminal() {
        let mut plan = diamond();
        assert!(!plan.is_complete());
        for path in ["a.f90", "b.f90", "c.f90", "d.f90"] {
            plan.mark(Path::new(path), UnitState::Fresh);
        }
        assert!(plan.is_complete());
        assert_eq!(plan.count(UnitState::Fresh), 4);
    }
}
