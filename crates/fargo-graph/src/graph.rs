//! Dependency graph construction and traversal.
//!
//! Nodes are compilation units; a `requires` relation becomes an edge from
//! the defining unit to the requiring unit once `resolve` matches the symbol
//! name. Construction errors (duplicate definition, cycle) are fatal;
//! unresolved symbols are collected and reported so independent subgraphs
//! can still build.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use fargo_util::errors::FargoError;

use crate::unit::CompilationUnit;

/// A required symbol with no defining unit. Reported, not fatal: only the
/// requiring unit (and its dependents) are excluded from the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub symbol: String,
    pub required_by: PathBuf,
}

/// Directed graph over compilation units, keyed by produced/required
/// interface names.
pub struct DependencyGraph {
    graph: DiGraph<PathBuf, ()>,
    indices: HashMap<PathBuf, NodeIndex>,
    units: HashMap<PathBuf, CompilationUnit>,
    /// Which unit defines each symbol. At most one definer per symbol.
    definers: HashMap<String, PathBuf>,
    /// Units whose `requires` set has been fully turned into edges. Units
    /// added (or re-added) later are resolved incrementally without
    /// touching these.
    resolved: HashSet<PathBuf>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            indices: HashMap::new(),
            units: HashMap::new(),
            definers: HashMap::new(),
            resolved: HashSet::new(),
        }
    }

    /// Insert or replace a compilation unit.
    ///
    /// Fails with [`FargoError::DuplicateDefinition`] if another live unit
    /// already defines one of this unit's symbols. Re-adding the same path
    /// replaces the previous unit and invalidates the resolution state of
    /// its former dependents.
    pub fn add_unit(&mut self, unit: CompilationUnit) -> Result<(), FargoError> {
        for symbol in &unit.defines {
            if let Some(existing) = self.definers.get(symbol) {
                if existing != unit.path() {
                    return Err(FargoError::DuplicateDefinition {
                        symbol: symbol.clone(),
                        first: existing.clone(),
                        second: unit.path().to_path_buf(),
                    });
                }
            }
        }

        let path = unit.path().to_path_buf();
        if self.units.contains_key(&path) {
            self.detach(&path);
        }

        if !self.indices.contains_key(&path) {
            let idx = self.graph.add_node(path.clone());
            self.indices.insert(path.clone(), idx);
        }

        for symbol in &unit.defines {
            self.definers.insert(symbol.clone(), path.clone());
        }
        self.units.insert(path, unit);
        Ok(())
    }

    /// Drop a unit from the graph (e.g. its source file was deleted).
    pub fn remove_unit(&mut self, path: &Path) -> Option<CompilationUnit> {
        if !self.units.contains_key(path) {
            return None;
        }
        self.detach(path);
        // The node stays in the petgraph arena but is unreachable: petgraph
        // node removal renumbers indices, which would corrupt the lookup
        // maps. Orphan nodes without a unit are skipped everywhere.
        self.indices.remove(path);
        self.units.remove(path)
    }

    /// Remove a unit's edges and symbol claims, and force its former
    /// dependents back into the unresolved pool.
    fn detach(&mut self, path: &Path) {
        let Some(&idx) = self.indices.get(path) else {
            return;
        };
        let dependents: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        for dep in dependents {
            self.resolved.remove(&self.graph[dep]);
        }
        self.graph.retain_edges(|g, e| {
            let (from, to) = g.edge_endpoints(e).expect("live edge");
            from != idx && to != idx
        });
        if let Some(unit) = self.units.get(path) {
            for symbol in &unit.defines {
                if self.definers.get(symbol).map(|p| p.as_path()) == Some(path) {
                    self.definers.remove(symbol);
                }
            }
        }
        self.resolved.remove(path);
    }

    /// Match required symbols to their defining units, creating edges.
    ///
    /// Only units added since the last call are processed, so newly
    /// generated units never force re-resolution of unrelated ones. Returns
    /// the requirements that still have no definer; the affected units stay
    /// unresolved and will be revisited by the next call.
    pub fn resolve(&mut self) -> Vec<Unresolved> {
        let mut unresolved = Vec::new();
        let pending: Vec<PathBuf> = self
            .units
            .keys()
            .filter(|p| !self.resolved.contains(*p))
            .cloned()
            .collect();

        for path in pending {
            let unit = &self.units[&path];
            let requires: Vec<String> = unit.requires.iter().cloned().collect();
            let to_idx = self.indices[&path];
            let mut complete = true;

            for symbol in requires {
                match self.definers.get(&symbol) {
                    Some(definer) if definer.as_path() == path.as_path() => {
                        // A file may use a module it defines itself.
                    }
                    Some(definer) => {
                        let from_idx = self.indices[definer];
                        if self.graph.find_edge(from_idx, to_idx).is_none() {
                            self.graph.add_edge(from_idx, to_idx, ());
                        }
                    }
                    None => {
                        complete = false;
                        unresolved.push(Unresolved {
                            symbol,
                            required_by: path.clone(),
                        });
                    }
                }
            }

            if complete {
                self.resolved.insert(path);
            }
        }

        unresolved.sort_by(|a, b| (&a.required_by, &a.symbol).cmp(&(&b.required_by, &b.symbol)));
        unresolved
    }

    /// Deterministic topological order: dependencies first, ties broken by
    /// path name. Fails with [`FargoError::CyclicDependency`] naming every
    /// unit in a cycle.
    pub fn topological_order(&self) -> Result<Vec<&CompilationUnit>, FargoError> {
        let mut in_degree: HashMap<&Path, usize> = HashMap::new();
        for path in self.units.keys() {
            let idx = self.indices[path];
            let n = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .filter(|i| self.indices.get(&self.graph[*i]).is_some())
                .count();
            in_degree.insert(path.as_path(), n);
        }

        let mut ready: BTreeSet<&Path> = in_degree
            .iter()
            .filter(|(_, &n)| n == 0)
            .map(|(&p, _)| p)
            .collect();
        let mut order: Vec<&CompilationUnit> = Vec::with_capacity(self.units.len());

        while let Some(&path) = ready.iter().next() {
            ready.remove(path);
            order.push(&self.units[path]);
            let idx = self.indices[path];
            let successors: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .collect();
            for succ in successors {
                let succ_path: &Path = self.graph[succ].as_path();
                if let Some(n) = in_degree.get_mut(succ_path) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(succ_path);
                    }
                }
            }
        }

        if order.len() < self.units.len() {
            return Err(FargoError::CyclicDependency {
                members: self.cycle_members(),
            });
        }
        Ok(order)
    }

    /// Names of all units participating in cycles, sorted.
    fn cycle_members(&self) -> Vec<String> {
        let mut members = BTreeSet::new();
        for scc in tarjan_scc(&self.graph) {
            if scc.len() > 1 {
                for idx in scc {
                    if let Some(unit) = self.units.get(&self.graph[idx]) {
                        members.insert(unit.name());
                    }
                }
            }
        }
        members.into_iter().collect()
    }

    /// Direct dependencies (units this unit requires), in path order.
    pub fn dependencies_of(&self, path: &Path) -> Vec<&CompilationUnit> {
        let Some(&idx) = self.indices.get(path) else {
            return Vec::new();
        };
        let mut deps: Vec<&CompilationUnit> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .filter_map(|i| self.units.get(&self.graph[i]))
            .collect();
        deps.sort_by(|a, b| a.path().cmp(b.path()));
        deps
    }

    /// Direct dependents (units requiring one of this unit's symbols).
    pub fn dependents_of(&self, path: &Path) -> Vec<&CompilationUnit> {
        let Some(&idx) = self.indices.get(path) else {
            return Vec::new();
        };
        let mut deps: Vec<&CompilationUnit> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .filter_map(|i| self.units.get(&self.graph[i]))
            .collect();
        deps.sort_by(|a, b| a.path().cmp(b.path()));
        deps
    }

    /// The unit defining `symbol`, if any.
    pub fn definer_of(&self, symbol: &str) -> Option<&CompilationUnit> {
        self.definers.get(symbol).and_then(|p| self.units.get(p))
    }

    pub fn unit(&self, path: &Path) -> Option<&CompilationUnit> {
        self.units.get(path)
    }

    /// All units, in path order.
    pub fn units(&self) -> Vec<&CompilationUnit> {
        let mut all: Vec<&CompilationUnit> = self.units.values().collect();
        all.sort_by(|a, b| a.path().cmp(b.path()));
        all
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
