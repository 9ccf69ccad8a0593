//! engine::state
//!
//! Shared state of one orchestration: error log, notices, outcome tallies
//! and the cancellation token.
//!
//! # Concurrency
//!
//! The state is cheap to clone; clones share the same log. Pool tasks
//! append concurrently, so every collection sits behind a `Mutex`. Entries
//! are only ever appended.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::core::types::RepoId;

/// The unit of work that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Shelve,
    Restore,
    Checkout,
    Synchronize,
    Update,
    Commit,
    Push,
    PullRequest,
    DeleteBranch,
    Tag,
    Pull,
    Reset,
    Replace,
    Test,
    Workflow,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Shelve => "shelve",
            Stage::Restore => "restore",
            Stage::Checkout => "checkout",
            Stage::Synchronize => "synchronize",
            Stage::Update => "update",
            Stage::Commit => "commit",
            Stage::Push => "push",
            Stage::PullRequest => "pull request",
            Stage::DeleteBranch => "delete branch",
            Stage::Tag => "tag",
            Stage::Pull => "pull",
            Stage::Reset => "reset",
            Stage::Replace => "replace",
            Stage::Test => "test",
            Stage::Workflow => "workflow",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A step that failed for one repository. Only that repository's remaining
/// steps are abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{repository}: {step} failed: {cause}")]
pub struct StepFailure {
    pub repository: RepoId,
    pub step: Stage,
    pub cause: String,
}

impl StepFailure {
    pub fn new(repository: &RepoId, step: Stage, cause: impl std::fmt::Display) -> Self {
        Self {
            repository: repository.clone(),
            step,
            cause: cause.to_string(),
        }
    }
}

/// Attach the repository and stage to a collaborator error.
pub(crate) trait AtStage<T> {
    fn at(self, repository: &RepoId, step: Stage) -> Result<T, StepFailure>;
}

impl<T, E: std::fmt::Display> AtStage<T> for Result<T, E> {
    fn at(self, repository: &RepoId, step: Stage) -> Result<T, StepFailure> {
        self.map_err(|e| StepFailure::new(repository, step, e))
    }
}

/// Something worth telling the user that is not a failure, e.g. a skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub repository: RepoId,
    pub message: String,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.repository, self.message)
    }
}

/// How a repository ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Skipped,
    Failed,
}

/// Per-outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

#[derive(Debug, Default)]
struct Log {
    errors: Vec<StepFailure>,
    notices: Vec<Notice>,
    tally: Tally,
}

/// State of one orchestration.
#[derive(Debug, Clone)]
pub struct OrchestrationState {
    dep_count: usize,
    log: Arc<Mutex<Log>>,
    token: CancellationToken,
    declined: bool,
}

impl OrchestrationState {
    pub fn new(dep_count: usize, token: CancellationToken) -> Self {
        Self {
            dep_count,
            log: Arc::default(),
            token,
            declined: false,
        }
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        // A panicked pool task must not take the log down with it.
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn dep_count(&self) -> usize {
        self.dep_count
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn declined(&self) -> bool {
        self.declined
    }

    pub(crate) fn set_declined(&mut self) {
        self.declined = true;
    }

    /// Append to the error log.
    pub fn fail(&self, failure: StepFailure) {
        tracing::warn!(repo = %failure.repository, step = %failure.step, cause = %failure.cause, "step failed");
        self.log().errors.push(failure);
    }

    /// Append a notice.
    pub fn notice(&self, repository: &RepoId, message: impl Into<String>) {
        let notice = Notice {
            repository: repository.clone(),
            message: message.into(),
        };
        tracing::info!(repo = %notice.repository, message = %notice.message, "notice");
        self.log().notices.push(notice);
    }

    /// Count one repository's outcome.
    pub fn count(&self, outcome: Outcome) {
        self.count_many(outcome, 1);
    }

    pub fn count_many(&self, outcome: Outcome, n: usize) {
        let mut log = self.log();
        match outcome {
            Outcome::Succeeded => log.tally.succeeded += n,
            Outcome::Skipped => log.tally.skipped += n,
            Outcome::Failed => log.tally.failed += n,
        }
    }

    pub fn errors(&self) -> Vec<StepFailure> {
        self.log().errors.clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.log().notices.clone()
    }

    pub fn tally(&self) -> Tally {
        self.log().tally
    }
}
