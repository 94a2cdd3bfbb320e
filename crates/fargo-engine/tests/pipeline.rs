//! End-to-end pipeline tests against temp projects with fake external tools
//! (shell scripts standing in for the compiler and generators).

use std::path::{Path, PathBuf};

use fargo_engine::report::BuildReport;
use fargo_engine::{run_build, BuildContext, BuildOptions};

/// A temp project with a manifest wired to fake tools.
struct TestProject {
    tmp: tempfile::TempDir,
}

const FAKE_FC: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then echo "fake-fortran 1.0"; exit 0; fi
while [ $# -gt 0 ]; do
  case "$1" in
    -c) IN=$2; shift 2;;
    -o) OUT=$2; shift 2;;
    -J) shift 2;;
    *) shift;;
  esac
done
if grep -q COMPILE_ERROR "$IN"; then
  echo "syntax error in $IN" >&2
  exit 1
fi
echo "object for $IN" > "$OUT"
"#;

const FAKE_PSY: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then echo "fake-psyclone 1.0"; exit 0; fi
while [ $# -gt 0 ]; do
  case "$1" in
    -opsy) PSY=$2; shift 2;;
    -oalg) ALG=$2; shift 2;;
    *) IN=$1; shift;;
  esac
done
if grep -q GENERATE_ERROR "$IN"; then
  echo "invalid invoke in $IN" >&2
  exit 1
fi
stem=$(basename "$IN" .x90)
printf 'module %s_psy\nuse kernel_mod\nend module\n' "$stem" > "$PSY"
printf 'program %s\nuse %s_psy\nend program\n' "$stem" "$stem" > "$ALG"
"#;

// Same contract as FAKE_PSY but reports a newer version and emits a
// marker so regenerated output is distinguishable.
const FAKE_PSY_V2: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then echo "fake-psyclone 2.0"; exit 0; fi
while [ $# -gt 0 ]; do
  case "$1" in
    -opsy) PSY=$2; shift 2;;
    -oalg) ALG=$2; shift 2;;
    *) IN=$1; shift;;
  esac
done
stem=$(basename "$IN" .x90)
printf '! lowering v2\nmodule %s_psy\nuse kernel_mod\nend module\n' "$stem" > "$PSY"
printf 'program %s\nuse %s_psy\nend program\n' "$stem" "$stem" > "$ALG"
"#;

const FAKE_PF: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then echo "fake-pfunit 1.0"; exit 0; fi
cp "$1" "$2"
"#;

impl TestProject {
    fn new() -> TestProject {
        let tmp = tempfile::tempdir().unwrap();
        let project = TestProject { tmp };
        std::fs::create_dir_all(project.tmp.path().join("fakebin")).unwrap();
        for (name, content) in [("fakefc", FAKE_FC), ("fakepsy", FAKE_PSY), ("fakepf", FAKE_PF)] {
            project.install_tool(name, content);
        }

        let manifest = format!(
            r#"
[build]
source-roots = ["src"]
workers = 2

[tools.fortran]
command = "{bin}/fakefc"
args = ["-c", "{{input}}", "-o", "{{output}}", "-J", "{{moddir}}"]

[tools.psyclone]
command = "{bin}/fakepsy"
args = ["-opsy", "{{output}}", "-oalg", "{{output}}", "{{input}}"]

[tools.pfunit]
command = "{bin}/fakepf"
args = ["{{input}}", "{{output}}"]
"#,
            bin = project.tmp.path().join("fakebin").display()
        );
        std::fs::write(project.tmp.path().join("Fargo.toml"), manifest).unwrap();
        std::fs::create_dir_all(project.tmp.path().join("src")).unwrap();
        project
    }

    /// Install (or replace in place) one fake tool script.
    fn install_tool(&self, name: &str, content: &str) {
        let path = self.tmp.path().join("fakebin").join(name);
        std::fs::write(&path, content).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.tmp.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn delete(&self, rel: &str) {
        std::fs::remove_file(self.tmp.path().join(rel)).unwrap();
    }

    fn ctx(&self) -> BuildContext {
        BuildContext::load(self.tmp.path()).unwrap()
    }

    async fn build(&self) -> BuildReport {
        run_build(&self.ctx(), &BuildOptions::default()).await.unwrap()
    }

    fn object_count(&self) -> usize {
        let dir = self.tmp.path().join("build/objects");
        if !dir.is_dir() {
            return 0;
        }
        std::fs::read_dir(dir).unwrap().count()
    }

    fn unit_state<'a>(&self, report: &'a BuildReport, suffix: &str) -> &'a str {
        report
            .units
            .iter()
            .find(|u| u.path.ends_with(suffix))
            .unwrap_or_else(|| panic!("no unit ending in {suffix}"))
            .state
            .as_str()
    }
}

fn leaf_mid_top(project: &TestProject) {
    project.write("src/leaf.f90", "module leaf_mod\nend module\n");
    project.write("src/mid.f90", "module mid_mod\nuse leaf_mod\nend module\n");
    project.write("src/top.f90", "program top\nuse mid_mod\nend program\n");
}

#[tokio::test]
async fn full_build_then_noop() {
    let project = TestProject::new();
    leaf_mid_top(&project);

    let first = project.build().await;
    assert!(first.success());
    assert_eq!(first.built, 3);
    assert_eq!(first.fresh, 0);
    assert_eq!(project.object_count(), 3);

    let second = project.build().await;
    assert!(second.success());
    assert_eq!(second.built, 0);
    assert_eq!(second.fresh, 3);
}

#[tokio::test]
async fn touching_a_leaf_rebuilds_exactly_its_dependents() {
    let project = TestProject::new();
    leaf_mid_top(&project);
    project.write("src/island.f90", "module island_mod\nend module\n");

    let first = project.build().await;
    assert_eq!(first.built, 4);

    project.write("src/leaf.f90", "module leaf_mod\ninteger :: changed\nend module\n");
    let second = project.build().await;
    assert!(second.success());
    assert_eq!(second.built, 3);
    assert_eq!(second.fresh, 1);
    assert_eq!(project.unit_state(&second, "island.f90"), "fresh");
}

#[tokio::test]
async fn cycle_aborts_before_any_action() {
    let project = TestProject::new();
    project.write("src/a.f90", "module a_mod\nuse b_mod\nend module\n");
    project.write("src/b.f90", "module b_mod\nuse a_mod\nend module\n");

    let err = run_build(&project.ctx(), &BuildOptions::default())
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("cycle"), "unexpected error: {message}");
    assert!(message.contains("a.f90"));
    assert!(message.contains("b.f90"));
    assert_eq!(project.object_count(), 0);
}

#[tokio::test]
async fn duplicate_definition_aborts_before_scheduling() {
    let project = TestProject::new();
    project.write("src/one.f90", "module shared_mod\nend module\n");
    project.write("src/two.f90", "module shared_mod\nend module\n");

    let err = run_build(&project.ctx(), &BuildOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("duplicate definition of module `shared_mod`"));
    assert_eq!(project.object_count(), 0);
}

#[tokio::test]
async fn generator_outputs_reenter_the_graph() {
    let project = TestProject::new();
    project.write("src/kernel_mod.f90", "module kernel_mod\nend module\n");
    project.write("src/invoke.x90", "! invoke the kernel\n");

    let first = project.build().await;
    assert!(first.success());
    // kernel + generated psy + generated alg
    assert_eq!(first.built, 3 + 1); // 3 compiles + 1 generator step
    assert_eq!(project.unit_state(&first, "invoke_psy.f90"), "built");
    assert_eq!(project.unit_state(&first, "invoke_alg.f90"), "built");

    let second = project.build().await;
    assert!(second.success());
    assert_eq!(second.built, 0);
    let step = &second.generators[0];
    assert_eq!(step.state, "fresh");
}

#[tokio::test]
async fn generator_upgrade_invalidates_generated_outputs() {
    let project = TestProject::new();
    project.write("src/kernel_mod.f90", "module kernel_mod\nend module\n");
    project.write("src/invoke.x90", "! invoke the kernel\n");
    assert!(project.build().await.success());

    // Same path, same args, newer generator. The step fingerprint carries
    // the probed version, so the outputs must be regenerated even though
    // they exist and are newer than the input.
    project.install_tool("fakepsy", FAKE_PSY_V2);
    let second = project.build().await;
    assert!(second.success());
    assert_eq!(second.generators[0].state, "built");
    assert_eq!(project.unit_state(&second, "invoke_psy.f90"), "built");

    let psy = std::fs::read_to_string(
        project.tmp.path().join("build/generated/invoke_psy.f90"),
    )
    .unwrap();
    assert!(psy.contains("lowering v2"));
}

#[tokio::test]
async fn test_spec_processor_feeds_one_compilable_output() {
    let project = TestProject::new();
    project.write("src/leaf.f90", "module leaf_mod\nend module\n");
    project.write("src/checks.pf", "module checks_mod\nuse leaf_mod\nend module\n");

    let report = project.build().await;
    assert!(report.success());
    assert_eq!(project.unit_state(&report, "checks.F90"), "built");
    // The generated spec must depend on leaf_mod, so leaf compiles first.
    assert_eq!(project.unit_state(&report, "leaf.f90"), "built");
}

#[tokio::test]
async fn failed_generator_blocks_only_its_consumers() {
    let project = TestProject::new();
    project.write("src/kernel_mod.f90", "module kernel_mod\nend module\n");
    project.write("src/invoke.x90", "! GENERATE_ERROR\n");
    project.write("src/island.f90", "module island_mod\nend module\n");

    let report = project.build().await;
    assert!(!report.success());
    assert_eq!(report.generators[0].state, "failed");
    assert!(report.generators[0]
        .diagnostics
        .as_deref()
        .unwrap()
        .contains("invalid invoke"));
    // Independent units still build.
    assert_eq!(project.unit_state(&report, "island.f90"), "built");
    assert_eq!(project.unit_state(&report, "kernel_mod.f90"), "built");
}

#[tokio::test]
async fn compile_failure_is_contained_to_dependents() {
    let project = TestProject::new();
    project.write("src/a.f90", "module a_mod\nend module\n");
    project.write(
        "src/b.f90",
        "module b_mod\nuse a_mod\n! COMPILE_ERROR\nend module\n",
    );
    project.write("src/c.f90", "module c_mod\nuse a_mod\nend module\n");
    project.write("src/d.f90", "program d\nuse b_mod\nend program\n");

    let report = project.build().await;
    assert!(!report.success());
    assert_eq!(project.unit_state(&report, "a.f90"), "built");
    assert_eq!(project.unit_state(&report, "b.f90"), "failed");
    assert_eq!(project.unit_state(&report, "c.f90"), "built");
    assert_eq!(project.unit_state(&report, "d.f90"), "blocked");

    let failed = report
        .units
        .iter()
        .find(|u| u.path.ends_with("b.f90"))
        .unwrap();
    assert!(failed.diagnostics.as_deref().unwrap().contains("syntax error"));
}

#[tokio::test]
async fn unresolved_symbol_blocks_subgraph_only() {
    let project = TestProject::new();
    project.write("src/mid.f90", "module mid_mod\nuse missing_mod\nend module\n");
    project.write("src/top.f90", "program top\nuse mid_mod\nend program\n");
    project.write("src/island.f90", "module island_mod\nend module\n");

    let report = project.build().await;
    assert!(!report.success());
    assert_eq!(project.unit_state(&report, "mid.f90"), "blocked");
    assert_eq!(project.unit_state(&report, "top.f90"), "blocked");
    assert_eq!(project.unit_state(&report, "island.f90"), "built");

    let blocked = report
        .units
        .iter()
        .find(|u| u.path.ends_with("mid.f90"))
        .unwrap();
    let diag = blocked.diagnostics.as_deref().unwrap();
    assert!(diag.contains("unresolved module `missing_mod`"));
    assert!(diag.contains("required by"));
}

#[tokio::test]
async fn deleting_a_definer_surfaces_unresolved_symbol() {
    let project = TestProject::new();
    leaf_mid_top(&project);
    assert!(project.build().await.success());

    project.delete("src/leaf.f90");
    let report = project.build().await;
    assert!(!report.success());
    assert_eq!(project.unit_state(&report, "mid.f90"), "blocked");
    assert_eq!(project.unit_state(&report, "top.f90"), "blocked");
}

#[tokio::test]
async fn dry_run_dispatches_nothing() {
    let project = TestProject::new();
    leaf_mid_top(&project);
    project.write("src/invoke.x90", "! invoke\n");

    let opts = BuildOptions {
        jobs: None,
        dry_run: true,
    };
    let report = run_build(&project.ctx(), &opts).await.unwrap();
    assert_eq!(report.built, 0);
    assert_eq!(project.object_count(), 0);
    assert!(!project.tmp.path().join("build/generated").exists());
}

#[tokio::test]
async fn clean_resets_to_full_rebuild() {
    let project = TestProject::new();
    leaf_mid_top(&project);
    assert_eq!(project.build().await.built, 3);
    assert_eq!(project.build().await.fresh, 3);

    fargo_engine::clean(&project.ctx()).unwrap();
    assert_eq!(project.object_count(), 0);
    assert_eq!(project.build().await.built, 3);
}

#[tokio::test]
async fn worker_limit_of_one_still_completes() {
    let project = TestProject::new();
    leaf_mid_top(&project);
    let opts = BuildOptions {
        jobs: Some(1),
        dry_run: false,
    };
    let report = run_build(&project.ctx(), &opts).await.unwrap();
    assert!(report.success());
    assert_eq!(report.built, 3);
}

#[tokio::test]
async fn plan_order_is_deterministic() {
    let project = TestProject::new();
    leaf_mid_top(&project);

    let registry = fargo_engine::tools::ToolRegistry::from_manifest(&project.ctx().manifest);
    let analysis = fargo_engine::analyse(&project.ctx(), &registry, true).unwrap();
    assert!(analysis.unresolved.is_empty());

    let order: Vec<PathBuf> = analysis
        .graph
        .topological_order()
        .unwrap()
        .iter()
        .map(|u| u.path().to_path_buf())
        .collect();
    let names: Vec<&str> = order
        .iter()
        .map(|p| Path::new(p).file_name().unwrap().to_str().unwrap())
        .collect();
    assert_eq!(names, vec!["leaf.f90", "mid.f90", "top.f90"]);
}
