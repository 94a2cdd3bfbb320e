use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all Fargo operations.
#[derive(Debug, Error, Diagnostic)]
pub enum FargoError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed configuration (e.g. Fargo.toml).
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check your Fargo.toml for syntax errors"))]
    Config { message: String },

    /// Two compilation units both define the same interface symbol.
    #[error(
        "duplicate definition of module `{symbol}`: defined by `{}` and `{}`",
        first.display(),
        second.display()
    )]
    #[diagnostic(help("A module name must be defined by exactly one source file"))]
    DuplicateDefinition {
        symbol: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A required interface symbol is not defined by any known unit.
    #[error("unresolved module `{symbol}`, required by `{}`", required_by.display())]
    UnresolvedSymbol {
        symbol: String,
        required_by: PathBuf,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle between: {}", members.join(", "))]
    CyclicDependency { members: Vec<String> },

    /// An external code generator exited non-zero or broke its output contract.
    #[error("generator failed for `{}`", input.display())]
    GeneratorFailure { input: PathBuf, stderr: String },

    /// The compiler (or test-spec processor) exited non-zero.
    #[error("compilation failed for `{}`", unit.display())]
    CompileFailure { unit: PathBuf, stderr: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type FargoResult<T> = miette::Result<T>;
