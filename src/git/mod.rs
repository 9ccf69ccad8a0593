//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. No other module imports
//! `git2` or spawns `git`. The engine sees git only through the async
//! [`Vcs`] and [`Discover`] capabilities, so orchestration can be tested
//! against [`mock::MockVcs`].
//!
//! # Responsibilities
//!
//! - Repository discovery under target directories
//! - Shelving and restoring local changes
//! - Branch checkout, creation and deletion
//! - Committing, tagging and pushing
//! - Remote URL lookup
//!
//! # Example
//!
//! ```ignore
//! use modfleet::git::{GitVcs, Vcs};
//! use std::path::Path;
//!
//! let vcs = GitVcs::new("origin");
//! let shelved = vcs.stash(Path::new("/fleet/core")).await?;
//! ```

pub mod discover;
mod interface;
pub mod mock;
mod vcs;

pub use discover::{Discover, DiscoveryError, FsDiscover};
pub use interface::{run_git, Git, GitError, WorktreeStatus, STASH_MARKER};
pub use vcs::{GitVcs, Vcs};
