//! Source inventory: discovery, classification, and staleness fingerprints.
//!
//! The inventory walks one or more root directories, classifies files by
//! extension, and keeps one [`SourceFile`] per path. Re-scanning is
//! idempotent, and a single subdirectory can be re-scanned mid-build to pick
//! up freshly generated sources without re-walking the whole tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use fargo_util::errors::{FargoError, FargoResult};

use crate::source::{SourceFile, SourceKind};

/// The current set of discovered source files, deduplicated by path.
#[derive(Debug, Default)]
pub struct Inventory {
    files: BTreeMap<PathBuf, SourceFile>,
    exclude: Option<GlobSet>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inventory with exclude glob patterns applied during scans.
    pub fn with_excludes(patterns: &[String]) -> FargoResult<Self> {
        if patterns.is_empty() {
            return Ok(Self::default());
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| FargoError::Config {
                message: format!("invalid exclude pattern `{pattern}`: {e}"),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| FargoError::Config {
            message: format!("invalid exclude patterns: {e}"),
        })?;
        Ok(Self {
            files: BTreeMap::new(),
            exclude: Some(set),
        })
    }

    /// Walk `root` recursively, fingerprinting every recognised file.
    ///
    /// May be called again for a subdirectory (e.g. the generated-source
    /// directory) without touching entries outside it. Returns the number of
    /// files registered or refreshed.
    pub fn scan(&mut self, root: &Path) -> FargoResult<usize> {
        let mut count = 0usize;
        self.walk(root, &mut count)?;
        Ok(count)
    }

    /// Register a single file, replacing any previous entry for its path.
    /// Files of unrecognised kind are ignored.
    pub fn register(&mut self, path: &Path) -> FargoResult<Option<&SourceFile>> {
        let Some(kind) = SourceKind::classify(path) else {
            return Ok(None);
        };
        let file = SourceFile::scan(path, kind).map_err(FargoError::Io)?;
        self.files.insert(path.to_path_buf(), file);
        Ok(self.files.get(path))
    }

    fn walk(&mut self, dir: &Path, count: &mut usize) -> FargoResult<()> {
        let entries = std::fs::read_dir(dir).map_err(FargoError::Io)?;
        for entry in entries {
            let entry = entry.map_err(FargoError::Io)?;
            let path = entry.path();
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            if let Some(exclude) = &self.exclude {
                if exclude.is_match(&path) {
                    tracing::debug!(path = %path.display(), "excluded from inventory");
                    continue;
                }
            }
            if path.is_dir() {
                self.walk(&path, count)?;
            } else if let Some(kind) = SourceKind::classify(&path) {
                let file = SourceFile::scan(&path, kind).map_err(FargoError::Io)?;
                self.files.insert(path, file);
                *count += 1;
            }
        }
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(path)
    }

    /// All files, in path order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// Files of a particular kind, in path order.
    pub fn files_of_kind(&self, kind: SourceKind) -> impl Iterator<Item = &SourceFile> {
        self.files.values().filter(move |f| f.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
