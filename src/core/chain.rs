//! core::chain
//!
//! The ordered sequence of repositories for one run.
//!
//! # Invariants
//!
//! - No repository appears twice
//! - For every retained edge dependent -> dependency, the dependency sits at
//!   an earlier position (established by [`crate::core::graph`])
//!
//! Backed by an owned `Vec` plus an identity-to-position map, so lookups by
//! identity are O(1).

use std::collections::HashMap;

use super::repository::Repository;
use super::types::RepoId;

/// A topologically ordered list of repositories.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    repos: Vec<Repository>,
    index: HashMap<RepoId, usize>,
}

impl Chain {
    /// Create a chain from repositories already in dependency order.
    ///
    /// Later duplicates of an identity are dropped.
    pub fn new(repos: impl IntoIterator<Item = Repository>) -> Self {
        let mut chain = Self::default();
        for repo in repos {
            if chain.index.contains_key(repo.id()) {
                continue;
            }
            chain.index.insert(repo.id().clone(), chain.repos.len());
            chain.repos.push(repo);
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Repository> {
        self.repos.iter()
    }

    pub fn get(&self, position: usize) -> Option<&Repository> {
        self.repos.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut Repository> {
        self.repos.get_mut(position)
    }

    /// Position of a repository in the chain.
    pub fn position(&self, id: &RepoId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn find(&self, id: &RepoId) -> Option<&Repository> {
        self.position(id).map(|i| &self.repos[i])
    }

    pub fn find_mut(&mut self, id: &RepoId) -> Option<&mut Repository> {
        self.position(id).map(move |i| &mut self.repos[i])
    }

    /// The repository after `id`, or `None` at the tail.
    pub fn next(&self, id: &RepoId) -> Option<&Repository> {
        let i = self.position(id)?;
        self.repos.get(i + 1)
    }

    /// The repository before `id`, or `None` at the head.
    pub fn prev(&self, id: &RepoId) -> Option<&Repository> {
        let i = self.position(id)?;
        i.checked_sub(1).map(|p| &self.repos[p])
    }

    /// Every repository strictly before `position`.
    pub fn before(&self, position: usize) -> &[Repository] {
        &self.repos[..position.min(self.repos.len())]
    }

    pub fn ids(&self) -> impl Iterator<Item = &RepoId> {
        self.repos.iter().map(Repository::id)
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Repository;
    type IntoIter = std::slice::Iter<'a, Repository>;

    fn into_iter(self) -> Self::IntoIter {
        self.repos.iter()
    }
}
