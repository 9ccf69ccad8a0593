//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! User-facing progress goes to stdout and respects the verbosity level.
//! Diagnostics go through `tracing` instead. In name-only mode regular
//! output is suppressed and only repository names are printed, so the
//! output can be piped into other tools.

use std::fmt::Display;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Quiet mode - errors only
    Quiet,
    /// Only names of repositories the run touched
    NameOnly,
    /// Normal mode - standard output
    #[default]
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags. Quiet wins over name-only, which wins over debug.
    pub fn from_flags(quiet: bool, name_only: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if name_only {
            Verbosity::NameOnly
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Whether regular progress output is shown.
    pub fn shows_progress(self) -> bool {
        matches!(self, Verbosity::Normal | Verbosity::Debug)
    }
}

/// Print a message (normal and debug modes).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_progress() {
        println!("{}", message);
    }
}

/// Print a repository name (name-only mode).
pub fn name(name: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::NameOnly {
        println!("{}", name);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (normal and debug modes).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_progress() {
        eprintln!("warning: {}", message);
    }
}

/// The position line printed before each repository: `( 2 / 5 ) path`.
pub fn position_line(index: usize, total: usize, path: impl Display) -> String {
    format!("( {} / {} ) {}", index, total, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_precedence() {
        assert_eq!(Verbosity::from_flags(true, true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true, true), Verbosity::NameOnly);
        assert_eq!(Verbosity::from_flags(false, false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false, false), Verbosity::Normal);
        assert!(!Verbosity::NameOnly.shows_progress());
    }

    #[test]
    fn position_line_format() {
        assert_eq!(position_line(1, 3, "/fleet/c"), "( 1 / 3 ) /fleet/c");
    }
}
