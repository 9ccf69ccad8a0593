//! toolchain::go
//!
//! [`ModTool`] backed by the `go` command.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{ModTool, ToolError};
use crate::core::types::ModulePath;

/// Lines of combined output kept in a failure message.
const OUTPUT_TAIL_LINES: usize = 20;

/// The Go toolchain.
#[derive(Debug, Clone)]
pub struct GoTool {
    program: PathBuf,
}

impl Default for GoTool {
    fn default() -> Self {
        Self {
            program: PathBuf::from("go"),
        }
    }
}

impl GoTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `go` binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, repo: &Path, args: &[String]) -> Result<(), ToolError> {
        let program = self.program.display().to_string();
        let command = format!("{} {}", program, args.join(" "));
        tracing::debug!(repo = %repo.display(), %command, "running");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(repo)
            // workspace files would override the per-module edits
            .env("GOWORK", "off")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ToolError::Spawn { program, source })?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(ToolError::Failed {
            command,
            status: output.status.code(),
            output: tail(&combined, OUTPUT_TAIL_LINES),
        })
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[async_trait]
impl ModTool for GoTool {
    async fn require(
        &self,
        repo: &Path,
        module: &ModulePath,
        version: &str,
    ) -> Result<(), ToolError> {
        // `go get` resolves branch names and pseudo-versions as well as tags.
        let args = ["get".into(), format!("{}@{}", module, version)];
        self.run(repo, &args).await
    }

    async fn replace(
        &self,
        repo: &Path,
        module: &ModulePath,
        local: &Path,
    ) -> Result<(), ToolError> {
        let args = [
            "mod".into(),
            "edit".into(),
            format!("-replace={}={}", module, local.display()),
        ];
        self.run(repo, &args).await
    }

    async fn drop_replace(&self, repo: &Path, module: &ModulePath) -> Result<(), ToolError> {
        let args = ["mod".into(), "edit".into(), format!("-dropreplace={}", module)];
        self.run(repo, &args).await
    }

    async fn tidy(&self, repo: &Path) -> Result<(), ToolError> {
        self.run(repo, &["mod".into(), "tidy".into()]).await
    }

    async fn test(&self, repo: &Path) -> Result<(), ToolError> {
        self.run(repo, &["test".into(), "./...".into()]).await
    }
}
