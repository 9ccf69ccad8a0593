//! git::discover
//!
//! Enumerate git working trees under the target directories.
//!
//! A target that is itself a repository yields just that repository. Any
//! other target is walked breadth-first; a directory containing `.git` is
//! collected and not descended into. Hidden directories and common vendored
//! trees are skipped.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::core::repository::DiscoveredRepo;

use super::interface::Git;

/// Directory names never descended into.
const SKIP_DIRS: &[&str] = &["vendor", "node_modules", "testdata", "target"];

/// How deep below a target discovery looks for repositories.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Errors from repository discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("target directory does not exist: {0}")]
    MissingTarget(PathBuf),

    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("discovery task failed: {0}")]
    Join(String),
}

/// Enumerates repositories for a run.
#[async_trait]
pub trait Discover: Send + Sync {
    /// Repositories under `targets`, in a stable order.
    async fn discover(&self, targets: &[PathBuf]) -> Result<Vec<DiscoveredRepo>, DiscoveryError>;
}

/// Filesystem discovery backed by git2 for remote URLs.
#[derive(Debug, Clone)]
pub struct FsDiscover {
    remote: String,
    max_depth: usize,
}

impl FsDiscover {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    fn discover_blocking(&self, targets: &[PathBuf]) -> Result<Vec<DiscoveredRepo>, DiscoveryError> {
        let mut seen = std::collections::HashSet::new();
        let mut found = Vec::new();

        for target in targets {
            if !target.is_dir() {
                return Err(DiscoveryError::MissingTarget(target.clone()));
            }
            for path in walk(target, self.max_depth)? {
                let key = path.canonicalize().unwrap_or_else(|_| path.clone());
                if !seen.insert(key) {
                    continue;
                }
                let mut repo = DiscoveredRepo::new(&path);
                match Git::open(&path).and_then(|git| git.remote_url(&self.remote)) {
                    Ok(Some(url)) => repo = repo.with_remote_url(url),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(repo = %path.display(), error = %e, "no remote url");
                    }
                }
                found.push(repo);
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl Discover for FsDiscover {
    async fn discover(&self, targets: &[PathBuf]) -> Result<Vec<DiscoveredRepo>, DiscoveryError> {
        let this = self.clone();
        let targets = targets.to_vec();
        tokio::task::spawn_blocking(move || this.discover_blocking(&targets))
            .await
            .map_err(|e| DiscoveryError::Join(e.to_string()))?
    }
}

fn is_repo(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Breadth-first walk, siblings sorted by name.
fn walk(target: &Path, max_depth: usize) -> Result<Vec<PathBuf>, DiscoveryError> {
    if is_repo(target) {
        return Ok(vec![target.to_path_buf()]);
    }

    let mut repos = Vec::new();
    let mut queue = VecDeque::from([(target.to_path_buf(), 0usize)]);

    while let Some((dir, depth)) = queue.pop_front() {
        let entries = fs::read_dir(&dir).map_err(|source| DiscoveryError::Unreadable {
            path: dir.clone(),
            source,
        })?;

        let mut children: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.starts_with('.') && !SKIP_DIRS.contains(&n))
            })
            .collect();
        children.sort();

        for child in children {
            if is_repo(&child) {
                repos.push(child);
            } else if depth + 1 < max_depth {
                queue.push_back((child, depth + 1));
            }
        }
    }

    Ok(repos)
}
