//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module is the **single doorway** to git for modfleet. Local
//! repository reads and writes go through `git2`; network operations (fetch,
//! pull, push) go through the `git` CLI so the user's credential helpers and
//! SSH agent apply unchanged.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::CommandFailed`]: A `git` subprocess exited non-zero
//!
//! # Example
//!
//! ```ignore
//! use modfleet::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! if git.has_changes()? {
//!     git.commit_all("modfleet: update fleet dependencies")?;
//! }
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::core::types::{BranchName, SemVer, TypeError};

/// Message recorded on stashes created by modfleet.
///
/// Restoration only pops stashes carrying this marker.
pub const STASH_MARKER: &str = "modfleet: shelved local changes";

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo { path: PathBuf },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound { refname: String },

    /// HEAD does not point at a branch.
    #[error("HEAD is detached or unborn")]
    DetachedHead,

    #[error("invalid ref name: {message}")]
    InvalidRefName { message: String },

    /// A `git` subprocess failed.
    #[error("`git {command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError { message: String },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal { message: String },
}

impl GitError {
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::InvalidRefName {
            message: err.to_string(),
        }
    }
}

/// Summary of working tree changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
}

impl WorktreeStatus {
    /// No staged, unstaged or untracked changes.
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && self.untracked == 0
    }
}

/// Run a `git` subprocess in `dir`, returning trimmed stdout.
pub fn run_git(dir: &Path, args: &[&str]) -> Result<String, GitError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| GitError::CommandFailed {
            command: args.join(" "),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// The git interface for one working tree.
pub struct Git {
    repo: git2::Repository,
    workdir: PathBuf,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git").field("workdir", &self.workdir).finish()
    }
}

impl Git {
    // =========================================================================
    // Opening
    // =========================================================================

    /// Open the repository whose working tree is exactly `path`.
    ///
    /// Unlike discovery, this never walks up to a parent repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` is not a repository root
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        let workdir = repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();
        Ok(Self { repo, workdir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run a `git` subprocess in this working tree.
    pub fn run(&self, args: &[&str]) -> Result<String, GitError> {
        run_git(&self.workdir, args)
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub fn worktree_status(&self) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::from_git2(e, "status"))?;

        let mut result = WorktreeStatus::default();
        for entry in statuses.iter() {
            let status = entry.status();
            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }
            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }
            if status.is_wt_new() {
                result.untracked += 1;
            }
        }
        Ok(result)
    }

    /// Whether the working tree has anything to commit (untracked included).
    pub fn has_changes(&self) -> Result<bool, GitError> {
        Ok(!self.worktree_status()?.is_clean())
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Get the current branch name, if on a branch.
    ///
    /// Returns `None` if HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None)
    }

    pub fn branch_exists(&self, name: &BranchName) -> bool {
        self.repo
            .find_branch(name.as_str(), git2::BranchType::Local)
            .is_ok()
    }

    /// Whether the local branch `name` has a configured upstream.
    pub fn has_upstream(&self, name: &BranchName) -> bool {
        self.repo
            .find_branch(name.as_str(), git2::BranchType::Local)
            .and_then(|branch| branch.upstream())
            .is_ok()
    }

    /// Check out `name`, creating it at HEAD when missing and `create` is set.
    ///
    /// Returns whether the branch was created.
    pub fn checkout_branch(&self, name: &BranchName, create: bool) -> Result<bool, GitError> {
        let refname = format!("refs/heads/{}", name);
        let mut created = false;

        if !self.branch_exists(name) {
            if !create {
                return Err(GitError::RefNotFound { refname });
            }
            let head = self
                .repo
                .head()
                .and_then(|h| h.peel_to_commit())
                .map_err(|e| GitError::from_git2(e, "HEAD"))?;
            self.repo
                .branch(name.as_str(), &head, false)
                .map_err(|e| GitError::from_git2(e, &refname))?;
            created = true;
        }

        let target = self
            .repo
            .revparse_single(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))?;
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.safe();
        self.repo
            .checkout_tree(&target, Some(&mut checkout))
            .map_err(|e| GitError::from_git2(e, &refname))?;
        self.repo
            .set_head(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))?;

        Ok(created)
    }

    /// Delete a local branch. The branch must not be checked out.
    pub fn delete_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let mut branch = self
            .repo
            .find_branch(name.as_str(), git2::BranchType::Local)
            .map_err(|e| GitError::from_git2(e, &format!("refs/heads/{}", name)))?;
        branch.delete()?;
        Ok(())
    }

    /// Hard-reset the checked-out branch to `refname`.
    pub fn reset_hard_to(&self, refname: &str) -> Result<(), GitError> {
        let target = self
            .repo
            .revparse_single(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;
        self.repo
            .reset(&target, git2::ResetType::Hard, None)
            .map_err(|e| GitError::from_git2(e, refname))?;
        Ok(())
    }

    // =========================================================================
    // Stash
    // =========================================================================

    /// Shelve local changes, untracked files included.
    ///
    /// Returns `false` when there was nothing to shelve.
    pub fn stash_save(&mut self) -> Result<bool, GitError> {
        if !self.has_changes()? {
            return Ok(false);
        }
        let sig = self.signature()?;
        match self.repo.stash_save(
            &sig,
            STASH_MARKER,
            Some(git2::StashFlags::INCLUDE_UNTRACKED),
        ) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(GitError::from_git2(e, "stash")),
        }
    }

    /// Pop the most recent modfleet stash, if any.
    ///
    /// Returns whether a stash was restored.
    pub fn stash_pop_marked(&mut self) -> Result<bool, GitError> {
        let mut found = None;
        self.repo
            .stash_foreach(|index, message, _| {
                if message.contains(STASH_MARKER) {
                    found = Some(index);
                    false
                } else {
                    true
                }
            })
            .map_err(|e| GitError::from_git2(e, "stash list"))?;

        match found {
            Some(index) => {
                self.repo
                    .stash_pop(index, None)
                    .map_err(|e| GitError::from_git2(e, "stash pop"))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // Commits and tags
    // =========================================================================

    /// Stage every change (additions, modifications, deletions) and commit.
    pub fn commit_all(&self, message: &str) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .map_err(|e| GitError::from_git2(e, "commit"))?;
        Ok(())
    }

    /// Create a lightweight tag at HEAD.
    pub fn create_tag(&self, version: &SemVer) -> Result<(), GitError> {
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel(git2::ObjectType::Commit))
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        self.repo
            .tag_lightweight(&version.to_string(), &head, false)
            .map_err(|e| GitError::from_git2(e, &format!("refs/tags/{}", version)))?;
        Ok(())
    }

    /// Highest semver tag in the repository.
    ///
    /// Tags that are not valid versions are ignored.
    pub fn latest_version_tag(&self) -> Result<Option<SemVer>, GitError> {
        let names = self.repo.tag_names(None)?;
        Ok(names
            .iter()
            .flatten()
            .filter_map(|name| SemVer::parse(name).ok())
            .max())
    }

    // =========================================================================
    // Remotes
    // =========================================================================

    /// Get the URL for a remote.
    ///
    /// Returns `None` if the remote doesn't exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::Internal {
                message: e.message().to_string(),
            }),
        }
    }

    fn signature(&self) -> Result<git2::Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => git2::Signature::now("modfleet", "modfleet@localhost").map_err(Into::into),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo() -> (TempDir, Git) {
        let temp = TempDir::new().unwrap();
        let repo = git2::Repository::init(temp.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Fleet Tester").unwrap();
            config.set_str("user.email", "tester@example.com").unwrap();
        }
        fs::write(temp.path().join("README.md"), "hello\n").unwrap();
        let git = Git::open(temp.path()).unwrap();
        git.commit_all("initial").unwrap();
        (temp, git)
    }

    #[test]
    fn open_rejects_non_repo() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Git::open(temp.path()),
            Err(GitError::NotARepo { .. })
        ));
    }

    #[test]
    fn commit_all_picks_up_new_files() {
        let (temp, git) = init_repo();
        assert!(!git.has_changes().unwrap());

        fs::write(temp.path().join("new.txt"), "x").unwrap();
        assert!(git.has_changes().unwrap());

        git.commit_all("add new").unwrap();
        assert!(!git.has_changes().unwrap());
    }

    #[test]
    fn checkout_creates_and_deletes_branches() {
        let (_temp, git) = init_repo();
        let original = git.current_branch().unwrap().unwrap();
        let feature = BranchName::new("feature/bump").unwrap();

        assert!(matches!(
            git.checkout_branch(&feature, false),
            Err(GitError::RefNotFound { .. })
        ));
        assert!(git.checkout_branch(&feature, true).unwrap());
        assert_eq!(git.current_branch().unwrap(), Some(feature.clone()));
        assert!(!git.checkout_branch(&feature, true).unwrap());

        git.checkout_branch(&original, false).unwrap();
        git.delete_branch(&feature).unwrap();
        assert!(!git.branch_exists(&feature));
    }

    #[test]
    fn stash_round_trip_includes_untracked() {
        let (temp, mut git) = init_repo();
        assert!(!git.stash_save().unwrap());

        fs::write(temp.path().join("scratch.txt"), "wip").unwrap();
        fs::write(temp.path().join("README.md"), "edited\n").unwrap();
        assert!(git.stash_save().unwrap());
        assert!(!git.has_changes().unwrap());
        assert!(!temp.path().join("scratch.txt").exists());

        assert!(git.stash_pop_marked().unwrap());
        assert!(temp.path().join("scratch.txt").exists());
        assert_eq!(
            fs::read_to_string(temp.path().join("README.md")).unwrap(),
            "edited\n"
        );
        assert!(!git.stash_pop_marked().unwrap());
    }

    #[test]
    fn latest_tag_ignores_non_versions() {
        let (_temp, git) = init_repo();
        assert_eq!(git.latest_version_tag().unwrap(), None);

        git.create_tag(&SemVer::parse("v1.2.3").unwrap()).unwrap();
        git.create_tag(&SemVer::parse("v1.10.0").unwrap()).unwrap();
        git.repo
            .tag_lightweight(
                "release-candidate",
                &git.repo.head().unwrap().peel(git2::ObjectType::Commit).unwrap(),
                false,
            )
            .unwrap();

        assert_eq!(
            git.latest_version_tag().unwrap(),
            Some(SemVer::parse("v1.10.0").unwrap())
        );
    }

    #[test]
    fn remote_url_missing_is_none() {
        let (_temp, git) = init_repo();
        assert_eq!(git.remote_url("origin").unwrap(), None);
    }
}
