//! CLI styling utilities for terminal output.
//!
//! Provides semantic colors, output helpers and formatted tables.

use std::sync::atomic::{AtomicBool, Ordering};

pub mod colors;
pub mod output;
pub mod table;

pub use output::*;
pub use table::*;

/// Global flag to track if colors are disabled.
static NO_COLOR: AtomicBool = AtomicBool::new(false);

/// Global flag to track if status output is suppressed.
static QUIET: AtomicBool = AtomicBool::new(false);

/// Sets the global no-color flag.
pub fn set_no_color(value: bool) {
    NO_COLOR.store(value, Ordering::SeqCst);
}

/// Checks if colors are disabled.
pub fn no_color() -> bool {
    NO_COLOR.load(Ordering::SeqCst)
}

/// Sets the global quiet flag.
pub fn set_quiet(value: bool) {
    QUIET.store(value, Ordering::SeqCst);
}

/// Checks if status output is suppressed. Values requested by the user
/// (`read`, `list`) are printed regardless.
pub fn quiet() -> bool {
    QUIET.load(Ordering::SeqCst)
}
