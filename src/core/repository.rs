//! core::repository
//!
//! The repository entity tracked through one orchestration run.
//!
//! # Lifecycle
//!
//! A [`DiscoveredRepo`] is produced by discovery (path plus remote URL). The
//! graph builder reads its manifest and turns it into a [`Repository`]. Step
//! markers are then recorded by the orchestrator as pipeline steps complete.
//! Nothing here is persisted.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::manifest::{Manifest, Requirement};
use super::types::{ModulePath, RepoId};

/// A pipeline step that completed for a repository.
///
/// Markers feed the end-of-run summary only; they never drive control flow
/// for other repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    /// Local changes were shelved before the run.
    Stashed,
    /// The working tree was brought up to date (pull, dependency bump, replace).
    Updated,
    /// Local changes were committed.
    Committed,
    /// The branch was pushed to the remote.
    Pushed,
    /// A release tag was created.
    Tagged,
    /// A pull request was opened.
    PrOpened,
    /// The module test suite passed.
    Tested,
    /// The working tree was reset to the base branch.
    Reset,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Stashed => "stashed",
            Step::Updated => "updated",
            Step::Committed => "committed",
            Step::Pushed => "pushed",
            Step::Tagged => "tagged",
            Step::PrOpened => "pr-opened",
            Step::Tested => "tested",
            Step::Reset => "reset",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A repository found by discovery, before its manifest is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRepo {
    pub path: PathBuf,
    pub remote_url: Option<String>,
}

impl DiscoveredRepo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            remote_url: None,
        }
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }
}

/// A repository in the working set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    id: RepoId,
    remote_name: String,
    remote_url: Option<String>,
    module: ModulePath,
    pinned: Option<String>,
    requirements: BTreeMap<ModulePath, Requirement>,
    markers: BTreeSet<Step>,
}

impl Repository {
    /// Build a repository from its discovery record and manifest.
    pub fn new(discovered: &DiscoveredRepo, manifest: Manifest) -> Self {
        let remote_name = discovered
            .remote_url
            .as_deref()
            .and_then(remote_name_from_url)
            .unwrap_or_else(|| dir_name(&discovered.path));

        Self {
            id: RepoId::new(&discovered.path),
            remote_name,
            remote_url: discovered.remote_url.clone(),
            module: manifest.module,
            pinned: None,
            requirements: manifest.requirements,
            markers: BTreeSet::new(),
        }
    }

    /// Pin this repository to an explicit version.
    ///
    /// Pinned repositories are skipped by version-changing actions.
    pub fn with_pin(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.pinned = (!version.is_empty()).then_some(version);
        self
    }

    pub fn id(&self) -> &RepoId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        self.id.path()
    }

    /// Host/owner/name derived from the remote URL, or the directory name.
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }

    pub fn module(&self) -> &ModulePath {
        &self.module
    }

    pub fn pinned_version(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    pub fn requirements(&self) -> &BTreeMap<ModulePath, Requirement> {
        &self.requirements
    }

    pub fn depends_on(&self, module: &ModulePath) -> bool {
        self.requirements.contains_key(module)
    }

    /// Record that `step` completed.
    pub fn mark(&mut self, step: Step) {
        self.markers.insert(step);
    }

    pub fn has(&self, step: Step) -> bool {
        self.markers.contains(&step)
    }

    /// Completed steps, in declaration order.
    pub fn markers(&self) -> &BTreeSet<Step> {
        &self.markers
    }

    /// Whether the run changed anything in this repository.
    ///
    /// Shelving alone does not count.
    pub fn was_touched(&self) -> bool {
        self.markers.iter().any(|s| *s != Step::Stashed)
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Derive `host/owner/name` from a git remote URL.
///
/// Handles HTTPS, SSH (`ssh://`) and scp-like (`git@host:owner/name`) forms.
///
/// # Example
///
/// ```
/// use modfleet::core::repository::remote_name_from_url;
///
/// assert_eq!(
///     remote_name_from_url("git@github.com:acme/widgets.git").as_deref(),
///     Some("github.com/acme/widgets")
/// );
/// assert_eq!(
///     remote_name_from_url("https://github.com/acme/widgets").as_deref(),
///     Some("github.com/acme/widgets")
/// );
/// assert_eq!(remote_name_from_url("not a url"), None);
/// ```
pub fn remote_name_from_url(url: &str) -> Option<String> {
    let url = url.trim();
    let rest = if let Some((_, rest)) = url.split_once("://") {
        // drop any user@ prefix and port
        let rest = rest.split_once('@').map_or(rest, |(_, r)| r);
        let (host, path) = rest.split_once('/')?;
        let host = host.split(':').next()?;
        format!("{host}/{path}")
    } else {
        let rest = url.split_once('@').map_or(url, |(_, r)| r);
        let (host, path) = rest.split_once(':')?;
        format!("{host}/{path}")
    };

    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    if rest.contains(char::is_whitespace) || rest.split('/').count() < 2 {
        return None;
    }
    if rest.split('/').any(str::is_empty) {
        return None;
    }
    Some(rest.to_string())
}
