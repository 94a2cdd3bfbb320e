use std::io::Write;

use console::Style;

/// Print a Cargo-style status line: `   Compiling physics_mod.f90`
///
/// The `label` is right-padded to 12 characters and printed in bold green,
/// followed by the `message` in the default terminal colour.
pub fn status(label: &str, message: &str) {
    let green_bold = Style::new().green().bold();
    let _ = writeln!(
        std::io::stderr(),
        "{:>12} {message}",
        green_bold.apply_to(label),
    );
}

/// Print a warning-style status line (bold yellow label).
pub fn status_warn(label: &str, message: &str) {
    let yellow_bold = Style::new().yellow().bold();
    let _ = writeln!(
        std::io::stderr(),
        "{:>12} {message}",
        yellow_bold.apply_to(label),
    );
}

/// Print an error-style status line (bold red label).
pub fn status_error(label: &str, message: &str) {
    let red_bold = Style::new().red().bold();
    let _ = writeln!(
        std::io::stderr(),
        "{:>12} {message}",
        red_bold.apply_to(label),
    );
}
