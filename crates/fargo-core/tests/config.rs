use std::path::{Path, PathBuf};

use fargo_core::config::{Manifest, MANIFEST_FILE};

fn write_manifest(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join(MANIFEST_FILE);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn empty_manifest_uses_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_manifest(tmp.path(), "");
    let manifest = Manifest::load(&path).unwrap();

    assert_eq!(manifest.build.source_roots, vec![PathBuf::from("src")]);
    assert_eq!(manifest.build.build_dir, PathBuf::from("build"));
    assert!(manifest.build.workers >= 1);
    assert!(manifest.tools.is_empty());
}

#[test]
fn full_manifest_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_manifest(
        tmp.path(),
        r#"
[build]
source-roots = ["src", "kernels"]
build-dir = "out"
workers = 2
exclude = ["**/old/**"]

[tools.fortran]
command = "mpif90"
args = ["-c", "{input}", "-o", "{output}", "-J", "{moddir}"]

[tools.psyclone]
command = "psyclone"
args = ["-api", "dynamo0.3", "{input}"]
"#,
    );
    let manifest = Manifest::load(&path).unwrap();

    assert_eq!(manifest.build.workers, 2);
    assert_eq!(manifest.build.source_roots.len(), 2);
    assert_eq!(manifest.build.exclude, vec!["**/old/**".to_string()]);

    let fortran = manifest.tool("fortran").unwrap();
    assert_eq!(fortran.command, "mpif90");
    assert!(fortran.args.contains(&"{moddir}".to_string()));
    assert!(manifest.tool("psyclone").is_some());
    assert!(manifest.tool("pfunit").is_none());
}

#[test]
fn malformed_manifest_is_config_error() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_manifest(tmp.path(), "[build\nworkers = ");
    let err = Manifest::load(&path).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn find_and_load_walks_ancestors() {
    let tmp = tempfile::tempdir().unwrap();
    write_manifest(tmp.path(), "[build]\nworkers = 3\n");
    let nested = tmp.path().join("src/science");
    std::fs::create_dir_all(&nested).unwrap();

    let (root, manifest) = Manifest::find_and_load(&nested).unwrap();
    assert_eq!(root, tmp.path());
    assert_eq!(manifest.build.workers, 3);
}

#[test]
fn find_and_load_without_manifest_fails() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(Manifest::find_and_load(tmp.path()).is_err());
}
