//! Build fingerprints for staleness decisions.
//!
//! A unit's fingerprint is a SHA-256 over its own source content hash, the
//! tool command line, and the fingerprints of its direct dependencies.
//! Because dependency fingerprints are folded in, a change anywhere upstream
//! changes the fingerprint of everything downstream, while an upstream
//! rebuild that leaves inputs identical does not.
//!
//! Fingerprints are persisted as hex text files under
//! `<project>/.fargo/fingerprints/` so the build directory holds only tool
//! output. No other state survives between runs.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use fargo_util::errors::{FargoError, FargoResult};

/// A computed build fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
}

/// Derive the fingerprint storage directory for a project.
pub fn storage_dir(project_root: &Path) -> PathBuf {
    project_root.join(".fargo").join("fingerprints")
}

/// Compute a unit fingerprint from its inputs.
///
/// `dep_hashes` must already be sorted by the caller for determinism.
pub fn compute(source_hash: &str, tool_line: &str, dep_hashes: &[String]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(b"src:");
    hasher.update(source_hash.as_bytes());
    hasher.update(b"\n");
    hasher.update(b"tool:");
    hasher.update(tool_line.as_bytes());
    hasher.update(b"\n");
    for dep in dep_hashes {
        hasher.update(b"dep:");
        hasher.update(dep.as_bytes());
        hasher.update(b"\n");
    }
    let result = hasher.finalize();
    Fingerprint {
        hash: format!("{result:x}"),
    }
}

/// Filename-safe key for a unit, derived from its project-relative path.
pub fn unit_key(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == ':' { "__".to_string() } else { c.to_string() })
        .collect()
}

fn fingerprint_path(fp_dir: &Path, key: &str) -> PathBuf {
    fp_dir.join(format!("{key}.txt"))
}

/// Load a previously stored fingerprint, if it exists.
pub fn load(fp_dir: &Path, key: &str) -> Option<Fingerprint> {
    let path = fingerprint_path(fp_dir, key);
    std::fs::read_to_string(path).ok().map(|hash| Fingerprint {
        hash: hash.trim().to_string(),
    })
}

/// Save a fingerprint to disk after a successful action.
pub fn save(fp_dir: &Path, key: &str, fp: &Fingerprint) -> FargoResult<()> {
    let path = fingerprint_path(fp_dir, key);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(FargoError::Io)?;
    }
    std::fs::write(&path, &fp.hash).map_err(|e| FargoError::Generic {
        message: format!("Failed to write fingerprint: {e}"),
    })?;
    Ok(())
}
