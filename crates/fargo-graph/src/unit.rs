//! Compilation unit: one source file with its interface surface.

use std::collections::BTreeSet;
use std::path::Path;

use fargo_core::extract::Interface;
use fargo_core::source::SourceFile;

/// A single compilation unit: one source file plus the set of interface
/// symbols it defines (zero for program/driver files) and the set it
/// requires (zero for leaf units). Symbols are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationUnit {
    pub source: SourceFile,
    pub defines: BTreeSet<String>,
    pub requires: BTreeSet<String>,
}

impl CompilationUnit {
    pub fn new(source: SourceFile, interface: Interface) -> Self {
        Self {
            source,
            defines: interface.defines,
            requires: interface.requires,
        }
    }

    /// A unit with no interface at all (e.g. a C source).
    pub fn opaque(source: SourceFile) -> Self {
        Self {
            source,
            defines: BTreeSet::new(),
            requires: BTreeSet::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.source.path
    }

    /// Short display name: the file name.
    pub fn name(&self) -> String {
        self.source
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.path.display().to_string())
    }
}
