//! Core data types for the Fargo build orchestrator.
//!
//! This crate defines the project model: source files and their kinds, the
//! source inventory (discovery + staleness fingerprints), the shallow Fortran
//! interface extractor, manifest parsing, and fingerprint persistence.
//!
//! This crate is intentionally free of async code and process spawning.

pub mod config;
pub mod extract;
pub mod fingerprint;
pub mod inventory;
pub mod source;
