//! git::vcs
//!
//! The version-control capability consumed by the engine.
//!
//! [`Vcs`] is async so the orchestrator can fan out over a worker pool;
//! [`GitVcs`] runs every call on the blocking pool, opening the repository
//! fresh each time (git2 handles are not `Sync`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::types::{BranchName, SemVer};

use super::interface::{Git, GitError};

/// Version-control operations on one working tree.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Shelve local changes. Returns whether anything was shelved.
    async fn stash(&self, repo: &Path) -> Result<bool, GitError>;

    /// Restore changes shelved by [`Vcs::stash`]. Returns whether anything
    /// was restored.
    async fn unstash(&self, repo: &Path) -> Result<bool, GitError>;

    /// Check out `name`; create it at HEAD when missing and `create` is set.
    /// Returns whether the branch was created.
    async fn checkout_branch(
        &self,
        repo: &Path,
        name: &BranchName,
        create: bool,
    ) -> Result<bool, GitError>;

    async fn current_branch(&self, repo: &Path) -> Result<Option<BranchName>, GitError>;

    async fn delete_branch(&self, repo: &Path, name: &BranchName) -> Result<(), GitError>;

    async fn has_changes(&self, repo: &Path) -> Result<bool, GitError>;

    /// Stage everything and commit.
    async fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError>;

    /// Fast-forward `branch` from its upstream before it is changed.
    /// Returns `false`, doing nothing, when the branch tracks no upstream.
    async fn fast_forward(&self, repo: &Path, branch: &BranchName) -> Result<bool, GitError>;

    /// Push `branch` to the remote, setting upstream.
    async fn push(&self, repo: &Path, branch: &BranchName) -> Result<(), GitError>;

    /// Fetch and fast-forward the current branch.
    async fn pull(&self, repo: &Path) -> Result<(), GitError>;

    /// Check out `base` and hard-reset it to its remote-tracking ref.
    async fn reset_to_base(&self, repo: &Path, base: &BranchName) -> Result<(), GitError>;

    /// Tag HEAD with `version` and push the tag.
    async fn tag(&self, repo: &Path, version: &SemVer) -> Result<(), GitError>;

    /// Highest semver tag, if any.
    async fn latest_tag(&self, repo: &Path) -> Result<Option<SemVer>, GitError>;

    async fn remote_url(&self, repo: &Path) -> Result<Option<String>, GitError>;
}

/// Production [`Vcs`] over git2 and the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitVcs {
    remote: String,
}

impl GitVcs {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
        }
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    async fn with_git<T, F>(&self, repo: &Path, op: F) -> Result<T, GitError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Git, &str) -> Result<T, GitError> + Send + 'static,
    {
        let path: PathBuf = repo.to_path_buf();
        let remote = self.remote.clone();
        tokio::task::spawn_blocking(move || {
            let mut git = Git::open(&path)?;
            op(&mut git, &remote)
        })
        .await
        .map_err(|e| GitError::Internal {
            message: format!("git task failed: {}", e),
        })?
    }
}

#[async_trait]
impl Vcs for GitVcs {
    async fn stash(&self, repo: &Path) -> Result<bool, GitError> {
        self.with_git(repo, |git, _| git.stash_save()).await
    }

    async fn unstash(&self, repo: &Path) -> Result<bool, GitError> {
        self.with_git(repo, |git, _| git.stash_pop_marked()).await
    }

    async fn checkout_branch(
        &self,
        repo: &Path,
        name: &BranchName,
        create: bool,
    ) -> Result<bool, GitError> {
        let name = name.clone();
        self.with_git(repo, move |git, remote| {
            if !git.branch_exists(&name) {
                // Prefer tracking an existing remote branch over a fresh one.
                let remote_ref = format!("{}/{}", remote, name);
                if git.run(&["fetch", remote, name.as_str()]).is_ok() {
                    git.run(&["branch", "--track", name.as_str(), remote_ref.as_str()])?;
                }
            }
            git.checkout_branch(&name, create)
        })
        .await
    }

    async fn current_branch(&self, repo: &Path) -> Result<Option<BranchName>, GitError> {
        self.with_git(repo, |git, _| git.current_branch()).await
    }

    async fn delete_branch(&self, repo: &Path, name: &BranchName) -> Result<(), GitError> {
        let name = name.clone();
        self.with_git(repo, move |git, _| git.delete_branch(&name))
            .await
    }

    async fn has_changes(&self, repo: &Path) -> Result<bool, GitError> {
        self.with_git(repo, |git, _| git.has_changes()).await
    }

    async fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError> {
        let message = message.to_string();
        self.with_git(repo, move |git, _| git.commit_all(&message))
            .await
    }

    async fn fast_forward(&self, repo: &Path, branch: &BranchName) -> Result<bool, GitError> {
        let branch = branch.clone();
        self.with_git(repo, move |git, remote| {
            if !git.has_upstream(&branch) {
                return Ok(false);
            }
            git.run(&["pull", "--ff-only", remote, branch.as_str()])?;
            Ok(true)
        })
        .await
    }

    async fn push(&self, repo: &Path, branch: &BranchName) -> Result<(), GitError> {
        let branch = branch.clone();
        self.with_git(repo, move |git, remote| {
            git.run(&["push", "--set-upstream", remote, branch.as_str()])
                .map(drop)
        })
        .await
    }

    async fn pull(&self, repo: &Path) -> Result<(), GitError> {
        self.with_git(repo, |git, remote| {
            let branch = git.current_branch()?.ok_or(GitError::DetachedHead)?;
            git.run(&["pull", "--ff-only", remote, branch.as_str()])
                .map(drop)
        })
        .await
    }

    async fn reset_to_base(&self, repo: &Path, base: &BranchName) -> Result<(), GitError> {
        let base = base.clone();
        self.with_git(repo, move |git, remote| {
            git.run(&["fetch", remote, base.as_str()])?;
            let tracking = format!("refs/remotes/{}/{}", remote, base);
            if !git.branch_exists(&base) {
                let upstream = format!("{}/{}", remote, base);
                git.run(&["branch", "--track", base.as_str(), upstream.as_str()])?;
            }
            git.checkout_branch(&base, false)?;
            git.reset_hard_to(&tracking)
        })
        .await
    }

    async fn tag(&self, repo: &Path, version: &SemVer) -> Result<(), GitError> {
        let version = version.clone();
        self.with_git(repo, move |git, remote| {
            git.create_tag(&version)?;
            let refspec = format!("refs/tags/{}", version);
            git.run(&["push", remote, refspec.as_str()]).map(drop)
        })
        .await
    }

    async fn latest_tag(&self, repo: &Path) -> Result<Option<SemVer>, GitError> {
        self.with_git(repo, |git, remote| {
            // Tags created elsewhere count too; offline repos still work.
            if let Err(e) = git.run(&["fetch", "--tags", remote]) {
                tracing::debug!(repo = %git.workdir().display(), error = %e, "tag fetch failed");
            }
            git.latest_version_tag()
        })
        .await
    }

    async fn remote_url(&self, repo: &Path) -> Result<Option<String>, GitError> {
        self.with_git(repo, |git, remote| git.remote_url(remote)).await
    }
}
