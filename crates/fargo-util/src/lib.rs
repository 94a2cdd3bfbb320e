//! Shared utilities for the Fargo build orchestrator.
//!
//! This crate provides cross-cutting concerns used by all other Fargo crates:
//! error types, filesystem helpers, cryptographic hashing, process spawning,
//! and terminal status output.

pub mod errors;
pub mod fs;
pub mod hash;
pub mod process;
pub mod progress;
