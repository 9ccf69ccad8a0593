//! toolchain
//!
//! Module tooling capability: editing dependency requirements, local
//! replacements, tidying and running tests.
//!
//! The engine only sees [`ModTool`]. [`GoTool`] drives the `go` command;
//! [`mock::MockModTool`] records calls for tests.

mod go;
pub mod mock;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::ModulePath;

pub use go::GoTool;

/// Errors from module tooling.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The tool ran and reported failure.
    #[error("`{command}` failed{}: {output}", .status.map(|c| format!(" (exit {c})")).unwrap_or_default())]
    Failed {
        command: String,
        status: Option<i32>,
        output: String,
    },
}

/// Module tooling operations on one working tree.
#[async_trait]
pub trait ModTool: Send + Sync {
    /// Require `module` at `version` (a tag, branch or commit).
    async fn require(&self, repo: &Path, module: &ModulePath, version: &str)
        -> Result<(), ToolError>;

    /// Point `module` at a local working tree.
    async fn replace(&self, repo: &Path, module: &ModulePath, local: &Path)
        -> Result<(), ToolError>;

    /// Remove a replacement added by [`ModTool::replace`].
    async fn drop_replace(&self, repo: &Path, module: &ModulePath) -> Result<(), ToolError>;

    /// Reconcile the manifest and lock file with the source.
    async fn tidy(&self, repo: &Path) -> Result<(), ToolError>;

    /// Run the module's test suite. `Ok` means every test passed.
    async fn test(&self, repo: &Path) -> Result<(), ToolError>;
}
