//! Dependency graph and build planning for the Fargo build orchestrator.
//!
//! Compilation units are keyed by the interface symbols they define and
//! require; edges run from the defining unit to the requiring unit, so a
//! topological walk always visits dependencies first.

pub mod graph;
pub mod plan;
pub mod unit;
