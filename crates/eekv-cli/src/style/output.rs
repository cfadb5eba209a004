//! Output helper functions for consistent styled messages.
//!
//! Everything here is status output and is silenced by `--quiet`.

use super::colors::SemanticStyle;

/// Prints a success message with a checkmark.
pub fn print_success(msg: &str) {
    if !super::quiet() {
        println!("{} {}", "✓".success(), msg);
    }
}

/// Prints an error message with an X mark.
pub fn print_error(msg: &str) {
    if !super::quiet() {
        eprintln!("{} {}", "✗".error(), msg);
    }
}

/// Prints a warning message with a warning symbol.
pub fn print_warn(msg: &str) {
    if !super::quiet() {
        println!("{} {}", "⚠".warning(), msg);
    }
}

/// Prints a hint/suggestion with an arrow.
pub fn print_hint(msg: &str) {
    if !super::quiet() {
        println!("{} {}", "→".muted(), msg.muted());
    }
}

/// Prints a section header.
pub fn print_header(msg: &str) {
    if !super::quiet() {
        println!("{}", msg.header());
    }
}

/// Prints an empty line for spacing.
pub fn print_spacer() {
    if !super::quiet() {
        println!();
    }
}
