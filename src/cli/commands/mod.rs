//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine to execute the command
//! 3. Formats and displays output
//!
//! Handlers do NOT touch repositories directly.
//!
//! # Async Commands
//!
//! Fleet commands run on a tokio runtime built by the handler; `config` and
//! `completion` are synchronous.

mod completion;
mod config_cmd;
mod fleet;

pub use completion::completion;

use std::path::PathBuf;

use crate::cli::args::{Cli, Command, ConfigAction};
use anyhow::{Context as _, Result};

/// Dispatch a command to its handler. Returns the process exit code.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let root = fleet_root(&cli)?;
    match &cli.command {
        Command::Config { action } => {
            match action {
                ConfigAction::Path => config_cmd::path(&root)?,
                ConfigAction::Show => config_cmd::show(&root)?,
                ConfigAction::Init { force } => config_cmd::init(&root, *force)?,
            }
            Ok(0)
        }
        Command::Completion { shell } => {
            completion(*shell)?;
            Ok(0)
        }
        _ => fleet::run(&cli, &root),
    }
}

/// The first `--dir`, or the working directory. Workspace config and the
/// fleet lock live here.
fn fleet_root(cli: &Cli) -> Result<PathBuf> {
    match cli.dirs.first() {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("Failed to read current directory"),
    }
}
