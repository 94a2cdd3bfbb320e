//! `Fargo.toml` manifest parsing.
//!
//! The manifest describes the project layout (`[build]`) and the external
//! tool command templates (`[tools.*]`). Tool argument templates use
//! `{input}`, `{output}`, and `{moddir}` placeholders filled in at dispatch
//! time; the mapping from source kind to tool is data, not rule precedence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fargo_util::errors::{FargoError, FargoResult};

/// Manifest file name looked up from the working directory upwards.
pub const MANIFEST_FILE: &str = "Fargo.toml";

/// The parsed representation of a `Fargo.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub build: BuildSection,

    /// Tool command templates keyed by tool name
    /// (`fortran`, `cc`, `psyclone`, `pfunit`).
    #[serde(default)]
    pub tools: BTreeMap<String, ToolSection>,
}

/// Project layout and scheduling settings from `[build]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSection {
    /// Directories walked by the source inventory, relative to the project root.
    #[serde(default = "default_source_roots", rename = "source-roots")]
    pub source_roots: Vec<PathBuf>,

    /// Output directory for objects, module files, and generated sources.
    #[serde(default = "default_build_dir", rename = "build-dir")]
    pub build_dir: PathBuf,

    /// Worker limit for concurrent tool invocations.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Glob patterns excluded from the inventory walk.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            source_roots: default_source_roots(),
            build_dir: default_build_dir(),
            workers: default_workers(),
            exclude: Vec::new(),
        }
    }
}

fn default_source_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("src")]
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// One external tool: program plus argument template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSection {
    /// Program name or path (e.g. `mpif90`).
    pub command: String,
    /// Argument template; `{input}`, `{output}`, `{moddir}` are substituted.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Manifest {
    /// Parse a manifest from a file.
    pub fn load(path: &Path) -> FargoResult<Manifest> {
        let text = std::fs::read_to_string(path).map_err(FargoError::Io)?;
        let manifest: Manifest = toml::from_str(&text).map_err(|e| FargoError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        Ok(manifest)
    }

    /// Walk up from `start` to find the project root (the directory holding
    /// `Fargo.toml`) and parse the manifest there.
    pub fn find_and_load(start: &Path) -> FargoResult<(PathBuf, Manifest)> {
        let root = fargo_util::fs::find_ancestor_with(start, MANIFEST_FILE).ok_or_else(|| {
            FargoError::Config {
                message: format!(
                    "no {MANIFEST_FILE} found in `{}` or any parent directory",
                    start.display()
                ),
            }
        })?;
        let manifest = Manifest::load(&root.join(MANIFEST_FILE))?;
        Ok((root, manifest))
    }

    /// Look up a tool template by name.
    pub fn tool(&self, name: &str) -> Option<&ToolSection> {
        self.tools.get(name)
    }
}
