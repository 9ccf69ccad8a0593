//! toolchain::mock
//!
//! Recording [`ModTool`] for tests.
//!
//! When linked to a [`MockVcs`], a `require` that changes a version marks
//! the repository dirty, the way editing `go.mod` would.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{ModTool, ToolError};
use crate::core::types::ModulePath;
use crate::git::mock::MockVcs;

/// Operation kinds, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolOp {
    Require,
    Replace,
    DropReplace,
    Tidy,
    Test,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub repo: PathBuf,
    pub op: ToolOp,
    pub module: Option<ModulePath>,
    /// Version for `require`, local path for `replace`.
    pub arg: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<ToolCall>,
    failures: HashSet<(PathBuf, ToolOp)>,
    /// Current requirement versions per repository.
    required: HashMap<PathBuf, HashMap<ModulePath, String>>,
    /// Active replacements per repository.
    replaced: HashMap<PathBuf, HashSet<ModulePath>>,
}

#[derive(Debug, Clone, Default)]
pub struct MockModTool {
    inner: Arc<Mutex<Inner>>,
    vcs: Option<MockVcs>,
}

impl MockModTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark repositories dirty on `vcs` when a requirement changes.
    pub fn linked_to(mut self, vcs: MockVcs) -> Self {
        self.vcs = Some(vcs);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_on(&self, repo: impl Into<PathBuf>, op: ToolOp) {
        self.lock().failures.insert((repo.into(), op));
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.lock().calls.clone()
    }

    pub fn calls_for(&self, repo: impl AsRef<Path>) -> Vec<ToolCall> {
        let repo = repo.as_ref();
        self.lock()
            .calls
            .iter()
            .filter(|c| c.repo == repo)
            .cloned()
            .collect()
    }

    /// Replacements still active in `repo`.
    pub fn active_replaces(&self, repo: impl AsRef<Path>) -> Vec<ModulePath> {
        let mut active: Vec<_> = self
            .lock()
            .replaced
            .get(repo.as_ref())
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        active.sort();
        active
    }

    fn record(
        &self,
        repo: &Path,
        op: ToolOp,
        module: Option<&ModulePath>,
        arg: Option<String>,
    ) -> Result<MutexGuard<'_, Inner>, ToolError> {
        let mut inner = self.lock();
        inner.calls.push(ToolCall {
            repo: repo.to_path_buf(),
            op,
            module: module.cloned(),
            arg,
        });
        if inner.failures.contains(&(repo.to_path_buf(), op)) {
            return Err(ToolError::Failed {
                command: format!("{:?}", op).to_lowercase(),
                status: Some(1),
                output: format!("injected failure in {}", repo.display()),
            });
        }
        Ok(inner)
    }
}

#[async_trait]
impl ModTool for MockModTool {
    async fn require(
        &self,
        repo: &Path,
        module: &ModulePath,
        version: &str,
    ) -> Result<(), ToolError> {
        let changed = {
            let mut inner =
                self.record(repo, ToolOp::Require, Some(module), Some(version.to_string()))?;
            let previous = inner
                .required
                .entry(repo.to_path_buf())
                .or_default()
                .insert(module.clone(), version.to_string());
            previous.as_deref() != Some(version)
        };
        if changed {
            if let Some(vcs) = &self.vcs {
                vcs.set_dirty(repo, true);
            }
        }
        Ok(())
    }

    async fn replace(
        &self,
        repo: &Path,
        module: &ModulePath,
        local: &Path,
    ) -> Result<(), ToolError> {
        let arg = Some(local.display().to_string());
        let mut inner = self.record(repo, ToolOp::Replace, Some(module), arg)?;
        inner
            .replaced
            .entry(repo.to_path_buf())
            .or_default()
            .insert(module.clone());
        Ok(())
    }

    async fn drop_replace(&self, repo: &Path, module: &ModulePath) -> Result<(), ToolError> {
        let mut inner = self.record(repo, ToolOp::DropReplace, Some(module), None)?;
        if let Some(set) = inner.replaced.get_mut(repo) {
            set.remove(module);
        }
        Ok(())
    }

    async fn tidy(&self, repo: &Path) -> Result<(), ToolError> {
        self.record(repo, ToolOp::Tidy, None, None).map(drop)
    }

    async fn test(&self, repo: &Path) -> Result<(), ToolError> {
        self.record(repo, ToolOp::Test, None, None).map(drop)
    }
}
