//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Verbosity-aware output
//! - [`prompts`] - Confirmation prompts
//! - [`summary`] - End-of-run summary
//!
//! # Design
//!
//! All user-facing text goes through this module so that `--quiet` and
//! `--name-only` are honored in one place. Diagnostics go through `tracing`.

pub mod output;
pub mod prompts;
pub mod summary;
