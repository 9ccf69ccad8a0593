//! engine
//!
//! Runs one action across the fleet: Discover -> Shelve -> Build -> Orchestrate -> Restore.
//!
//! # Architecture
//!
//! The engine only talks to the outside world through capability traits
//! bundled in [`Collaborators`]. Production wiring lives in the CLI; tests
//! plug in the in-memory mocks.
//!
//! - [`coordinator`] wraps one run end to end and guarantees that shelved
//!   changes are restored exactly once, whatever happens in between.
//! - [`orchestrator`] walks the chain and schedules the action: a bounded
//!   pool for independent actions, strict chain order for the rest.
//! - `pipeline` is the per-repository sync pipeline.
//! - `tasks` holds the other per-repository actions.
//!
//! # Invariants
//!
//! - Chain order is the only authority for cross-repository ordering
//! - A failing step abandons only that repository's remaining steps
//! - Cancellation is cooperative: once the token is set, no new unit starts

pub mod actions;
pub mod coordinator;
pub mod orchestrator;
mod pipeline;
pub mod state;
mod tasks;

pub use actions::{
    Action, ActionClass, PoolTask, Schedule, SequencedTask, SyncOptions, WorkflowOptions,
};
pub use coordinator::{CleanupFailure, RunError, RunReport, RunRequest, ShutdownCoordinator};
pub use orchestrator::Orchestrator;
pub use state::{Notice, OrchestrationState, Outcome, Stage, StepFailure, Tally};

use std::sync::Arc;

use crate::core::manifest::ManifestSource;
use crate::forge::PullRequests;
use crate::git::{Discover, Vcs};
use crate::toolchain::ModTool;
use crate::ui::output::Verbosity;
use crate::ui::prompts::Confirm;

/// The capabilities a run needs.
#[derive(Clone)]
pub struct Collaborators {
    pub discover: Arc<dyn Discover>,
    pub manifests: Arc<dyn ManifestSource>,
    pub vcs: Arc<dyn Vcs>,
    pub tool: Arc<dyn ModTool>,
    pub pull_requests: Arc<dyn PullRequests>,
    pub confirm: Arc<dyn Confirm>,
}

/// Knobs that shape scheduling and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Worker pool size for independent actions.
    pub jobs: usize,
    pub verbosity: Verbosity,
    /// Skip the confirmation prompt.
    pub assume_yes: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            verbosity: Verbosity::Normal,
            assume_yes: false,
        }
    }
}

/// Host parallelism, or 1 when it cannot be determined.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
