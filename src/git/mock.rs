//! git::mock
//!
//! In-memory [`Vcs`] and [`Discover`] for deterministic tests.
//!
//! Each repository is modelled as a tiny state machine (current branch,
//! dirty flag, shelved flag, tags). Every call is recorded, failures can be
//! injected per repository and operation, and an optional latency lets tests
//! observe how many calls were in flight at once.
//!
//! # Example
//!
//! ```
//! use modfleet::git::mock::{MockVcs, VcsOp};
//! use modfleet::git::Vcs;
//! use std::path::Path;
//!
//! # tokio_test::block_on(async {
//! let vcs = MockVcs::new();
//! vcs.set_dirty("/fleet/a", true);
//!
//! assert!(vcs.stash(Path::new("/fleet/a")).await.unwrap());
//! assert!(!vcs.has_changes(Path::new("/fleet/a")).await.unwrap());
//! assert_eq!(vcs.count("/fleet/a", VcsOp::Stash), 1);
//! # });
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::discover::{Discover, DiscoveryError};
use super::interface::GitError;
use super::vcs::Vcs;
use crate::core::repository::DiscoveredRepo;
use crate::core::types::{BranchName, SemVer};

/// Operation kinds, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VcsOp {
    Stash,
    Unstash,
    Checkout,
    CurrentBranch,
    DeleteBranch,
    HasChanges,
    FastForward,
    Commit,
    Push,
    Pull,
    Reset,
    Tag,
    LatestTag,
    RemoteUrl,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsCall {
    pub repo: PathBuf,
    pub op: VcsOp,
    /// Branch, message, or version involved, when there is one.
    pub detail: Option<String>,
}

/// Modelled state of one repository.
#[derive(Debug, Clone)]
pub struct MockRepoState {
    pub branch: String,
    pub branches: BTreeSet<String>,
    /// Branches that track a remote branch.
    pub upstream: BTreeSet<String>,
    pub dirty: bool,
    pub shelved: bool,
    pub commits: usize,
    pub tags: Vec<SemVer>,
    pub remote_url: Option<String>,
}

impl Default for MockRepoState {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            branches: BTreeSet::from(["main".to_string()]),
            upstream: BTreeSet::new(),
            dirty: false,
            shelved: false,
            commits: 0,
            tags: Vec::new(),
            remote_url: None,
        }
    }
}

#[derive(Debug, Default)]
struct MockVcsInner {
    repos: HashMap<PathBuf, MockRepoState>,
    failures: HashSet<(PathBuf, VcsOp)>,
    calls: Vec<VcsCall>,
    latency: Option<Duration>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Mock version control, cheap to clone (shared state).
#[derive(Debug, Clone, Default)]
pub struct MockVcs {
    inner: Arc<Mutex<MockVcsInner>>,
}

impl MockVcs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockVcsInner> {
        // A panicking test thread must not hide the state from assertions.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep this long inside every call.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    /// Make `op` fail for `repo`.
    pub fn fail_on(&self, repo: impl Into<PathBuf>, op: VcsOp) {
        self.lock().failures.insert((repo.into(), op));
    }

    pub fn set_dirty(&self, repo: impl Into<PathBuf>, dirty: bool) {
        self.lock().repos.entry(repo.into()).or_default().dirty = dirty;
    }

    /// Make `branch` exist in `repo` and track a remote branch.
    pub fn set_upstream(&self, repo: impl Into<PathBuf>, branch: &str) {
        let mut inner = self.lock();
        let state = inner.repos.entry(repo.into()).or_default();
        state.branches.insert(branch.to_string());
        state.upstream.insert(branch.to_string());
    }

    pub fn add_tag(&self, repo: impl Into<PathBuf>, version: &str) {
        if let Ok(v) = SemVer::parse(version) {
            self.lock().repos.entry(repo.into()).or_default().tags.push(v);
        }
    }

    pub fn set_remote_url(&self, repo: impl Into<PathBuf>, url: &str) {
        self.lock().repos.entry(repo.into()).or_default().remote_url = Some(url.to_string());
    }

    /// Snapshot of a repository's modelled state.
    pub fn state(&self, repo: impl AsRef<Path>) -> MockRepoState {
        self.lock()
            .repos
            .get(repo.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.lock().calls.clone()
    }

    pub fn calls_for(&self, op: VcsOp) -> Vec<VcsCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    pub fn count(&self, repo: impl AsRef<Path>, op: VcsOp) -> usize {
        let repo = repo.as_ref();
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op == op && c.repo == repo)
            .count()
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Record the call, wait out the latency, then apply `f` to the state.
    async fn call<T>(
        &self,
        repo: &Path,
        op: VcsOp,
        detail: Option<String>,
        f: impl FnOnce(&mut MockRepoState) -> Result<T, GitError>,
    ) -> Result<T, GitError> {
        let latency = {
            let mut inner = self.lock();
            inner.calls.push(VcsCall {
                repo: repo.to_path_buf(),
                op,
                detail,
            });
            inner.in_flight += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
            inner.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.lock();
        inner.in_flight -= 1;
        if inner.failures.contains(&(repo.to_path_buf(), op)) {
            return Err(GitError::CommandFailed {
                command: format!("{:?}", op).to_lowercase(),
                stderr: format!("injected failure in {}", repo.display()),
            });
        }
        f(inner.repos.entry(repo.to_path_buf()).or_default())
    }
}

#[async_trait]
impl Vcs for MockVcs {
    async fn stash(&self, repo: &Path) -> Result<bool, GitError> {
        self.call(repo, VcsOp::Stash, None, |s| {
            if !s.dirty {
                return Ok(false);
            }
            s.dirty = false;
            s.shelved = true;
            Ok(true)
        })
        .await
    }

    async fn unstash(&self, repo: &Path) -> Result<bool, GitError> {
        self.call(repo, VcsOp::Unstash, None, |s| {
            if !s.shelved {
                return Ok(false);
            }
            s.shelved = false;
            s.dirty = true;
            Ok(true)
        })
        .await
    }

    async fn checkout_branch(
        &self,
        repo: &Path,
        name: &BranchName,
        create: bool,
    ) -> Result<bool, GitError> {
        let name = name.to_string();
        self.call(repo, VcsOp::Checkout, Some(name.clone()), move |s| {
            let created = if s.branches.contains(&name) {
                false
            } else if create {
                s.branches.insert(name.clone());
                true
            } else {
                return Err(GitError::RefNotFound {
                    refname: format!("refs/heads/{}", name),
                });
            };
            s.branch = name;
            Ok(created)
        })
        .await
    }

    async fn current_branch(&self, repo: &Path) -> Result<Option<BranchName>, GitError> {
        self.call(repo, VcsOp::CurrentBranch, None, |s| {
            Ok(Some(BranchName::new(s.branch.as_str())?))
        })
        .await
    }

    async fn delete_branch(&self, repo: &Path, name: &BranchName) -> Result<(), GitError> {
        let name = name.to_string();
        self.call(repo, VcsOp::DeleteBranch, Some(name.clone()), move |s| {
            if s.branch == name {
                return Err(GitError::Internal {
                    message: format!("cannot delete checked-out branch {}", name),
                });
            }
            s.branches.remove(&name);
            Ok(())
        })
        .await
    }

    async fn has_changes(&self, repo: &Path) -> Result<bool, GitError> {
        self.call(repo, VcsOp::HasChanges, None, |s| Ok(s.dirty))
            .await
    }

    async fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError> {
        self.call(repo, VcsOp::Commit, Some(message.to_string()), |s| {
            s.dirty = false;
            s.commits += 1;
            Ok(())
        })
        .await
    }

    async fn fast_forward(&self, repo: &Path, branch: &BranchName) -> Result<bool, GitError> {
        let name = branch.to_string();
        self.call(repo, VcsOp::FastForward, Some(name.clone()), move |s| {
            Ok(s.upstream.contains(&name))
        })
        .await
    }

    async fn push(&self, repo: &Path, branch: &BranchName) -> Result<(), GitError> {
        self.call(repo, VcsOp::Push, Some(branch.to_string()), |_| Ok(()))
            .await
    }

    async fn pull(&self, repo: &Path) -> Result<(), GitError> {
        self.call(repo, VcsOp::Pull, None, |_| Ok(())).await
    }

    async fn reset_to_base(&self, repo: &Path, base: &BranchName) -> Result<(), GitError> {
        let base = base.to_string();
        self.call(repo, VcsOp::Reset, Some(base.clone()), move |s| {
            s.branches.insert(base.clone());
            s.branch = base;
            s.dirty = false;
            Ok(())
        })
        .await
    }

    async fn tag(&self, repo: &Path, version: &SemVer) -> Result<(), GitError> {
        let version = version.clone();
        self.call(repo, VcsOp::Tag, Some(version.to_string()), move |s| {
            s.tags.push(version);
            Ok(())
        })
        .await
    }

    async fn latest_tag(&self, repo: &Path) -> Result<Option<SemVer>, GitError> {
        self.call(repo, VcsOp::LatestTag, None, |s| {
            Ok(s.tags.iter().max().cloned())
        })
        .await
    }

    async fn remote_url(&self, repo: &Path) -> Result<Option<String>, GitError> {
        self.call(repo, VcsOp::RemoteUrl, None, |s| Ok(s.remote_url.clone()))
            .await
    }
}

/// Discovery that returns a fixed list, ignoring the targets.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscover {
    repos: Vec<DiscoveredRepo>,
    missing: Option<PathBuf>,
}

impl StaticDiscover {
    pub fn new(repos: impl IntoIterator<Item = DiscoveredRepo>) -> Self {
        Self {
            repos: repos.into_iter().collect(),
            missing: None,
        }
    }

    /// Fail every discovery as if `target` did not exist.
    pub fn failing(target: impl Into<PathBuf>) -> Self {
        Self {
            repos: Vec::new(),
            missing: Some(target.into()),
        }
    }
}

#[async_trait]
impl Discover for StaticDiscover {
    async fn discover(&self, _targets: &[PathBuf]) -> Result<Vec<DiscoveredRepo>, DiscoveryError> {
        match &self.missing {
            Some(target) => Err(DiscoveryError::MissingTarget(target.clone())),
            None => Ok(self.repos.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn branch_lifecycle() {
        let vcs = MockVcs::new();
        let repo = Path::new("/fleet/a");
        let feature = BranchName::new("bump").unwrap();
        let main = BranchName::new("main").unwrap();

        assert!(vcs.checkout_branch(repo, &feature, false).await.is_err());
        assert!(vcs.checkout_branch(repo, &feature, true).await.unwrap());
        assert!(vcs.delete_branch(repo, &feature).await.is_err());

        vcs.checkout_branch(repo, &main, false).await.unwrap();
        vcs.delete_branch(repo, &feature).await.unwrap();
        assert!(!vcs.state(repo).branches.contains("bump"));
    }

    #[tokio::test]
    async fn injected_failure_is_recorded_and_returned() {
        let vcs = MockVcs::new();
        vcs.fail_on("/fleet/a", VcsOp::Pull);

        assert!(vcs.pull(Path::new("/fleet/a")).await.is_err());
        assert!(vcs.pull(Path::new("/fleet/b")).await.is_ok());
        assert_eq!(vcs.calls_for(VcsOp::Pull).len(), 2);
    }

    #[tokio::test]
    async fn latest_tag_is_highest() {
        let vcs = MockVcs::new();
        vcs.add_tag("/fleet/a", "v1.2.0");
        vcs.add_tag("/fleet/a", "v1.10.0");
        vcs.add_tag("/fleet/a", "v1.9.9");

        let latest = vcs.latest_tag(Path::new("/fleet/a")).await.unwrap();
        assert_eq!(latest, Some(SemVer::parse("v1.10.0").unwrap()));
    }
}
