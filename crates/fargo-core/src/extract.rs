//! Shallow lexical extraction of Fortran interface symbols.
//!
//! Finds `module NAME` definitions and `use NAME` requirements with a
//! line-oriented scan; this is deliberately not a Fortran parser. Symbol
//! names are case-insensitive and normalised to lowercase. Comments are
//! stripped at the first `!`. A malformed declaration downgrades the whole
//! file to empty symbol sets with a warning, never a crash.

use std::collections::BTreeSet;
use std::path::Path;

use crate::source::SourceFile;

/// Intrinsic and environment modules that are never build-graph edges.
const INTRINSIC_MODULES: &[&str] = &[
    "iso_c_binding",
    "iso_fortran_env",
    "ieee_arithmetic",
    "ieee_exceptions",
    "ieee_features",
    "omp_lib",
    "omp_lib_kinds",
    "mpi",
    "mpi_f08",
];

/// The interface surface of one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interface {
    /// Module names this file defines. Empty for program/driver units.
    pub defines: BTreeSet<String>,
    /// Module names this file uses. Empty for leaf/utility units.
    pub requires: BTreeSet<String>,
}

/// Extract the interface of an on-disk source file.
pub fn extract(source: &SourceFile) -> std::io::Result<Interface> {
    let text = std::fs::read_to_string(&source.path)?;
    Ok(extract_str(&text, &source.path))
}

/// Extract defined and required module names from Fortran source text.
///
/// `path` is used only for warning messages.
pub fn extract_str(text: &str, path: &Path) -> Interface {
    let mut interface = Interface::default();

    for (lineno, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_ascii_lowercase();

        if let Some(rest) = statement_tail(&lower, "module") {
            // `module procedure`/`module subroutine`/`module function` are
            // submodule bodies, and `end module` is handled by the `end`
            // keyword never matching `module`.
            let first = rest.split_whitespace().next().unwrap_or("");
            if matches!(first, "procedure" | "subroutine" | "function" | "pure" | "elemental") {
                continue;
            }
            match parse_name(rest) {
                Some(name) => {
                    interface.defines.insert(name);
                }
                None => {
                    tracing::warn!(
                        file = %path.display(),
                        line = lineno + 1,
                        "malformed module declaration; treating file as having no interface"
                    );
                    return Interface::default();
                }
            }
        } else if let Some(rest) = statement_tail(&lower, "use") {
            match parse_use(rest) {
                UseClause::Module(name) => {
                    if !INTRINSIC_MODULES.contains(&name.as_str()) {
                        interface.requires.insert(name);
                    }
                }
                UseClause::Intrinsic => {}
                UseClause::Malformed => {
                    tracing::warn!(
                        file = %path.display(),
                        line = lineno + 1,
                        "malformed use statement; treating file as having no interface"
                    );
                    return Interface::default();
                }
            }
        }
    }

    interface
}

enum UseClause {
    Module(String),
    Intrinsic,
    Malformed,
}

/// Text up to the first `!`. Shallow: a `!` inside a character literal is
/// treated as a comment too, which only loses symbols mentioned after it on
/// the same line.
fn strip_comment(line: &str) -> &str {
    match line.find('!') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// If `line` starts with the statement keyword followed by more text,
/// return the remainder.
fn statement_tail<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    // Keyword must end at a word boundary: `use` yes, `user_mod` no.
    if rest.starts_with(|c: char| c.is_whitespace() || c == ',') {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// Parse a `use` statement tail: `name`, `name, only: ...`, or
/// `, intrinsic :: name`.
fn parse_use(rest: &str) -> UseClause {
    let mut rest = rest.trim_start();
    if let Some(after_comma) = rest.strip_prefix(',') {
        // Module nature: `use, intrinsic :: foo` / `use, non_intrinsic :: foo`
        let Some((nature, tail)) = after_comma.split_once("::") else {
            return UseClause::Malformed;
        };
        if nature.trim() == "intrinsic" {
            return UseClause::Intrinsic;
        }
        rest = tail.trim_start();
    }
    match parse_name(rest) {
        Some(name) => UseClause::Module(name),
        None => UseClause::Malformed,
    }
}

/// Take a leading Fortran identifier, ending at whitespace or `,`.
fn parse_name(text: &str) -> Option<String> {
    let name: String = text
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(name)
}
