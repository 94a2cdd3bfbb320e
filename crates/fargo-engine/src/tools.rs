//! Data-driven registry of external tools.
//!
//! Maps a source kind to the tool that processes it: the MPI-wrapped Fortran
//! compiler, the C compiler, the PSyKAl code generator, and the test-spec
//! processor. Each tool is a command plus an argument template; there is no
//! suffix-rule precedence, the mapping is plain data. Tools are opaque:
//! exit code 0 plus all declared outputs present means success, anything
//! else is a hard failure for the unit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Output;

use fargo_core::config::{Manifest, ToolSection};
use fargo_core::source::SourceKind;
use fargo_util::errors::{FargoError, FargoResult};
use fargo_util::process::CommandBuilder;

/// One external tool: program plus argument template.
///
/// Template placeholders: `{input}` is the source path, `{moddir}` the
/// module/interface output directory, and each `{output}` occurrence
/// consumes the next declared output path in order.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl ToolSpec {
    fn new(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn from_config(name: &str, section: &ToolSection) -> Self {
        Self {
            name: name.to_string(),
            program: section.command.clone(),
            args: section.args.clone(),
        }
    }

    /// Substitute placeholders and build the command.
    pub fn render(&self, input: &Path, outputs: &[PathBuf], moddir: &Path) -> CommandBuilder {
        let mut next_output = 0usize;
        let mut builder = CommandBuilder::new(&self.program);
        for arg in &self.args {
            let rendered = match arg.as_str() {
                "{input}" => input.display().to_string(),
                "{moddir}" => moddir.display().to_string(),
                "{output}" => {
                    let out = outputs
                        .get(next_output)
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    next_output += 1;
                    out
                }
                other => other.to_string(),
            };
            builder = builder.arg(rendered);
        }
        builder
    }

    /// Rendered command line, used in fingerprints so a tool or flag change
    /// triggers rebuilds.
    pub fn line(&self, input: &Path, outputs: &[PathBuf], moddir: &Path) -> String {
        self.render(input, outputs, moddir).display()
    }

    /// Run the tool and enforce the output contract: exit code 0 and every
    /// declared output present on disk.
    pub fn invoke(
        &self,
        input: &Path,
        outputs: &[PathBuf],
        moddir: &Path,
    ) -> Result<Output, FargoError> {
        let output = self.render(input, outputs, moddir).exec()?;
        if !output.status.success() {
            return Err(self.failure(input, &output));
        }
        for declared in outputs {
            if !declared.is_file() {
                return Err(self.failure_message(
                    input,
                    format!(
                        "tool `{}` exited 0 but declared output `{}` does not exist",
                        self.name,
                        declared.display()
                    ),
                ));
            }
        }
        Ok(output)
    }

    /// Probe the tool's version (`--version`, first output line). Used both
    /// as an availability check and as a fingerprint input.
    pub fn probe_version(&self) -> Option<String> {
        let output = CommandBuilder::new(&self.program).arg("--version").exec().ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.lines().next().map(|l| l.trim().to_string())
    }

    fn failure(&self, input: &Path, output: &Output) -> FargoError {
        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if stderr.trim().is_empty() {
            stderr = String::from_utf8_lossy(&output.stdout).into_owned();
        }
        self.failure_message(input, stderr)
    }

    fn failure_message(&self, input: &Path, stderr: String) -> FargoError {
        if self.is_generator() {
            FargoError::GeneratorFailure {
                input: input.to_path_buf(),
                stderr,
            }
        } else {
            FargoError::CompileFailure {
                unit: input.to_path_buf(),
                stderr,
            }
        }
    }

    fn is_generator(&self) -> bool {
        matches!(self.name.as_str(), "psyclone" | "pfunit")
    }
}

/// Registry mapping source kinds to compiler or generator tools, with the
/// one-time compiler identity probe folded in.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    compilers: HashMap<SourceKind, ToolSpec>,
    generators: HashMap<SourceKind, ToolSpec>,
    /// First line of the Fortran compiler's `--version` output, recorded by
    /// [`ToolRegistry::probe`]. Participates in fingerprints.
    pub compiler_version: Option<String>,
    /// Generator versions by input kind, also recorded by [`ToolRegistry::probe`].
    /// A generator upgrade must invalidate previously generated outputs.
    generator_versions: HashMap<SourceKind, String>,
}

impl ToolRegistry {
    /// Build the registry from manifest `[tools.*]` sections, falling back
    /// to conventional defaults for anything unspecified.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let tool = |name: &str, default: ToolSpec| -> ToolSpec {
            manifest
                .tool(name)
                .map(|s| ToolSpec::from_config(name, s))
                .unwrap_or(default)
        };

        let fortran = tool(
            "fortran",
            ToolSpec::new(
                "fortran",
                "mpif90",
                &["-c", "{input}", "-o", "{output}", "-J", "{moddir}"],
            ),
        );
        let cc = tool("cc", ToolSpec::new("cc", "mpicc", &["-c", "{input}", "-o", "{output}"]));
        let psyclone = tool(
            "psyclone",
            ToolSpec::new(
                "psyclone",
                "psyclone",
                &["-opsy", "{output}", "-oalg", "{output}", "{input}"],
            ),
        );
        let pfunit = tool(
            "pfunit",
            ToolSpec::new("pfunit", "pfunit-parser", &["{input}", "{output}"]),
        );

        let mut compilers = HashMap::new();
        compilers.insert(SourceKind::FortranFree, fortran);
        compilers.insert(SourceKind::CSource, cc);

        let mut generators = HashMap::new();
        generators.insert(SourceKind::PsykalAlgorithm, psyclone);
        generators.insert(SourceKind::TestSpec, pfunit);

        Self {
            compilers,
            generators,
            compiler_version: None,
            generator_versions: HashMap::new(),
        }
    }

    /// The compiler handling directly compilable sources of `kind`.
    pub fn compiler_for(&self, kind: SourceKind) -> Option<&ToolSpec> {
        self.compilers.get(&kind)
    }

    /// The generator handling generator-input sources of `kind`.
    pub fn generator_for(&self, kind: SourceKind) -> Option<&ToolSpec> {
        self.generators.get(&kind)
    }

    /// Probed version of the generator handling `kind`, if the tool
    /// answered `--version`.
    pub fn generator_version(&self, kind: SourceKind) -> Option<&str> {
        self.generator_versions.get(&kind).map(String::as_str)
    }

    /// Verify the Fortran compiler answers `--version` and record its
    /// identity, plus the identity of every generator that answers. Called
    /// once before scheduling; never ambient state. A missing compiler is
    /// fatal; a missing generator only matters once one of its inputs is
    /// dispatched.
    pub fn probe(&mut self) -> FargoResult<()> {
        let fortran = self
            .compilers
            .get(&SourceKind::FortranFree)
            .expect("fortran compiler is always registered");
        match fortran.probe_version() {
            Some(version) => {
                tracing::info!(compiler = %fortran.program, %version, "compiler probe");
                self.compiler_version = Some(version);
            }
            None => {
                return Err(FargoError::Config {
                    message: format!(
                        "compiler `{}` is not available (--version failed)",
                        fortran.program
                    ),
                }
                .into())
            }
        }

        for (kind, spec) in &self.generators {
            match spec.probe_version() {
                Some(version) => {
                    tracing::debug!(tool = %spec.program, %version, "generator probe");
                    self.generator_versions.insert(*kind, version);
                }
                None => {
                    tracing::debug!(tool = %spec.program, "generator did not answer --version");
                }
            }
        }
        Ok(())
    }
}
