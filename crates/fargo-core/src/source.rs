//! Source files and their detected kinds.
//!
//! The kind decides which tool processes a file (compiler, PSyKAl code
//! generator, or test-spec processor). Mapping is by extension, held in data
//! rather than hidden suffix-rule precedence.

use std::path::{Path, PathBuf};

use fargo_util::fs::mtime_secs;
use fargo_util::hash::sha256_file;

/// What a discovered file is, and therefore which tool consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    /// Directly compilable free-form Fortran (`.f90`, `.F90`, `.f95`).
    FortranFree,
    /// PSyKAl algorithm file (`.x90`); consumed by the code generator,
    /// producing an algorithm source and a PSy-layer source.
    PsykalAlgorithm,
    /// Unit-test specification (`.pf`); consumed by the test-framework
    /// processor, producing one compilable Fortran source.
    TestSpec,
    /// Plain C source compiled to an object with no interface artifact.
    CSource,
}

impl SourceKind {
    /// Classify a path by extension. Returns `None` for files the build
    /// does not process.
    pub fn classify(path: &Path) -> Option<SourceKind> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "f90" | "F90" | "f95" | "F95" => Some(SourceKind::FortranFree),
            "x90" | "X90" => Some(SourceKind::PsykalAlgorithm),
            "pf" => Some(SourceKind::TestSpec),
            "c" => Some(SourceKind::CSource),
            _ => None,
        }
    }

    /// `true` for kinds that must run through a generator before any
    /// compilation can happen.
    pub fn is_generator_input(self) -> bool {
        matches!(self, SourceKind::PsykalAlgorithm | SourceKind::TestSpec)
    }

    /// `true` for kinds handed straight to a compiler.
    pub fn is_compilable(self) -> bool {
        matches!(self, SourceKind::FortranFree | SourceKind::CSource)
    }

    /// `true` for kinds whose text is scanned for module definitions/uses.
    pub fn is_extractable(self) -> bool {
        matches!(self, SourceKind::FortranFree)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceKind::FortranFree => "fortran",
            SourceKind::PsykalAlgorithm => "psykal-algorithm",
            SourceKind::TestSpec => "test-spec",
            SourceKind::CSource => "c",
        };
        f.write_str(name)
    }
}

/// One file discovered by the inventory.
///
/// Replaced wholesale on each scan, never mutated in place; an unchanged
/// file yields an identical fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
    /// SHA-256 of the file content, lowercase hex.
    pub fingerprint: String,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: u64,
}

impl SourceFile {
    /// Fingerprint an on-disk file of a known kind.
    pub fn scan(path: &Path, kind: SourceKind) -> std::io::Result<SourceFile> {
        Ok(SourceFile {
            path: path.to_path_buf(),
            kind,
            fingerprint: sha256_file(path)?,
            mtime: mtime_secs(path),
        })
    }

    /// File stem used for unit naming and generated-output naming.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}
