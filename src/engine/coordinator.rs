//! engine::coordinator
//!
//! Wraps exactly one run end to end.
//!
//! # Lifecycle
//!
//! ```text
//! lock -> discover -> shelve all -> [task: build graph -> orchestrate] -> restore all -> report
//! ```
//!
//! Graph building and orchestration run on their own tokio task. Whatever
//! that task does (finishes, fails, is cancelled, is declined, panics) the
//! coordinator restores shelved changes in every discovered repository
//! exactly once afterwards. Restore failures land on the report as a
//! [`CleanupFailure`]; they never panic and never hide the primary outcome.
//!
//! # Example
//!
//! ```ignore
//! let coordinator = ShutdownCoordinator::new(collaborators, request);
//! let token = coordinator.cancel_token();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     token.cancel();
//! });
//! let report = coordinator.run().await?;
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::actions::Action;
use super::orchestrator::Orchestrator;
use super::state::{Notice, OrchestrationState, Stage, StepFailure, Tally};
use super::{Collaborators, RunSettings};
use crate::core::chain::Chain;
use crate::core::graph::{self, BuildOptions, Excluded, GraphError};
use crate::core::lock::{FleetLock, LockError};
use crate::core::repository::{DiscoveredRepo, Step};
use crate::core::types::RepoId;
use crate::git::DiscoveryError;
use crate::ui::output;

/// Exit status for a run interrupted by the user.
const EXIT_CANCELLED: i32 = 130;

/// Errors that stop a run before anything was shelved.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Repositories whose shelved changes could not be restored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not restore local changes in: {}", .paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
pub struct CleanupFailure {
    pub paths: Vec<PathBuf>,
}

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub targets: Vec<PathBuf>,
    pub action: Action,
    pub build: BuildOptions,
    pub settings: RunSettings,
    /// Hold the fleet lock for this root while the run is active.
    pub lock_root: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(targets: Vec<PathBuf>, action: Action) -> Self {
        Self {
            targets,
            action,
            build: BuildOptions::default(),
            settings: RunSettings::default(),
            lock_root: None,
        }
    }
}

/// The readable outcome of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    action: Action,
    discovered: Vec<PathBuf>,
    chain: Chain,
    dep_count: usize,
    excluded: Vec<Excluded>,
    errors: Vec<StepFailure>,
    notices: Vec<Notice>,
    tally: Tally,
    failure: Option<String>,
    cleanup: Option<CleanupFailure>,
    cancelled: bool,
    declined: bool,
}

impl RunReport {
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Every repository discovery found, in discovery order.
    pub fn discovered(&self) -> &[PathBuf] {
        &self.discovered
    }

    /// The chain with its final step markers. Empty when the graph could
    /// not be built.
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn dep_count(&self) -> usize {
        self.dep_count
    }

    /// Repositories left out of the graph.
    pub fn excluded(&self) -> &[Excluded] {
        &self.excluded
    }

    pub fn errors(&self) -> &[StepFailure] {
        &self.errors
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    /// A failure that stopped the whole run (cycle, crashed task).
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn cleanup_failure(&self) -> Option<&CleanupFailure> {
        self.cleanup.as_ref()
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn declined(&self) -> bool {
        self.declined
    }

    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty() || self.cleanup.is_some() || self.failure.is_some()
    }

    /// Process exit status for this run.
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else if self.cancelled {
            EXIT_CANCELLED
        } else {
            0
        }
    }
}

/// What the orchestration task hands back.
struct Orchestrated {
    chain: Chain,
    dep_count: usize,
    excluded: Vec<Excluded>,
    state: OrchestrationState,
}

#[derive(Debug, Error)]
enum TaskError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("graph task failed: {0}")]
    Join(String),
}

/// Runs one request with guaranteed cleanup.
pub struct ShutdownCoordinator {
    collaborators: Collaborators,
    request: RunRequest,
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new(collaborators: Collaborators, request: RunRequest) -> Self {
        Self {
            collaborators,
            request,
            token: CancellationToken::new(),
        }
    }

    /// The token that cancels this run. Cancelling twice is a no-op.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run, then hand the report to `complete` before returning it.
    pub async fn run_then<F>(self, complete: F) -> Result<RunReport, RunError>
    where
        F: FnOnce(&RunReport),
    {
        let report = self.run().await?;
        complete(&report);
        Ok(report)
    }

    /// Run to completion.
    ///
    /// # Errors
    ///
    /// Only failures before shelving (lock, discovery) are errors. Anything
    /// after that is reported on the [`RunReport`].
    pub async fn run(self) -> Result<RunReport, RunError> {
        let Self {
            collaborators,
            request,
            token,
        } = self;
        let verbosity = request.settings.verbosity;

        let _lock = request
            .lock_root
            .as_deref()
            .map(FleetLock::acquire)
            .transpose()?;

        let targets: Vec<String> = request
            .targets
            .iter()
            .map(|t| t.display().to_string())
            .collect();
        output::print(
            format!("\nSearching [{}] for git repositories...", targets.join(" ")),
            verbosity,
        );
        let discovered = collaborators.discover.discover(&request.targets).await?;
        output::print(
            format!(
                "\nFound {} repositories. Scanning for dependencies...",
                discovered.len()
            ),
            verbosity,
        );

        let (shelved, shelve_failures) = shelve_all(&collaborators, &discovered).await;
        let unshelvable: HashSet<&RepoId> = shelve_failures.iter().map(|f| &f.repository).collect();
        let working: Vec<DiscoveredRepo> = discovered
            .iter()
            .filter(|d| !unshelvable.contains(&RepoId::new(&d.path)))
            .cloned()
            .collect();

        let task = tokio::spawn(orchestrate(
            collaborators.clone(),
            working,
            request.clone(),
            token.clone(),
            shelved,
        ));
        let joined = task.await;

        let mut errors = shelve_failures;
        let (orchestrated, failure) = match joined {
            Ok(Ok(done)) => (Some(done), None),
            Ok(Err(e)) => (None, Some(e.to_string())),
            Err(e) => (None, Some(format!("orchestration task failed: {e}"))),
        };

        let troubled = failure.is_some()
            || !errors.is_empty()
            || orchestrated
                .as_ref()
                .is_some_and(|o| !o.state.errors().is_empty());
        if troubled {
            output::print("\nEncountered error! Cleaning...", verbosity);
        } else {
            output::print("\nFinishing up. Cleaning...", verbosity);
        }
        let cleanup = restore_all(&collaborators, &discovered).await;

        let (chain, dep_count, excluded, notices, tally, declined) = match orchestrated {
            Some(o) => {
                errors.extend(o.state.errors());
                (
                    o.chain,
                    o.dep_count,
                    o.excluded,
                    o.state.notices(),
                    o.state.tally(),
                    o.state.declined(),
                )
            }
            None => (Chain::default(), 0, Vec::new(), Vec::new(), Tally::default(), false),
        };

        Ok(RunReport {
            action: request.action,
            discovered: discovered.into_iter().map(|d| d.path).collect(),
            chain,
            dep_count,
            excluded,
            errors,
            notices,
            tally,
            failure,
            cleanup,
            cancelled: token.is_cancelled(),
            declined,
        })
    }
}

/// Shelve local changes everywhere, once.
///
/// Returns the repositories that had something shelved, and failures for
/// repositories that could not be shelved (they are left out of the run).
async fn shelve_all(
    collaborators: &Collaborators,
    discovered: &[DiscoveredRepo],
) -> (HashSet<PathBuf>, Vec<StepFailure>) {
    let mut shelved = HashSet::new();
    let mut failures = Vec::new();
    for repo in discovered {
        match collaborators.vcs.stash(&repo.path).await {
            Ok(true) => {
                tracing::debug!(repo = %repo.path.display(), "shelved local changes");
                shelved.insert(repo.path.clone());
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(repo = %repo.path.display(), error = %e, "cannot shelve; leaving repository out");
                failures.push(StepFailure::new(&RepoId::new(&repo.path), Stage::Shelve, e));
            }
        }
    }
    (shelved, failures)
}

/// Restore shelved changes everywhere, once.
async fn restore_all(
    collaborators: &Collaborators,
    discovered: &[DiscoveredRepo],
) -> Option<CleanupFailure> {
    let mut paths = Vec::new();
    for repo in discovered {
        match collaborators.vcs.unstash(&repo.path).await {
            Ok(restored) => {
                if restored {
                    tracing::debug!(repo = %repo.path.display(), "restored local changes");
                }
            }
            Err(e) => {
                tracing::error!(repo = %repo.path.display(), error = %e, "cannot restore local changes");
                paths.push(repo.path.clone());
            }
        }
    }
    (!paths.is_empty()).then_some(CleanupFailure { paths })
}

async fn orchestrate(
    collaborators: Collaborators,
    working: Vec<DiscoveredRepo>,
    request: RunRequest,
    token: CancellationToken,
    shelved: HashSet<PathBuf>,
) -> Result<Orchestrated, TaskError> {
    let manifests = collaborators.manifests.clone();
    let build_options = request.build.clone();
    let built = tokio::task::spawn_blocking(move || {
        graph::build(&working, manifests.as_ref(), &build_options)
    })
    .await
    .map_err(|e| TaskError::Join(e.to_string()))??;

    let verbosity = request.settings.verbosity;
    for excluded in &built.excluded {
        output::warn(
            format!("skipping {}: {}", excluded.path.display(), excluded.reason),
            verbosity,
        );
    }

    let mut chain = built.chain;
    for id in chain.ids().cloned().collect::<Vec<_>>() {
        if shelved.contains(id.path()) {
            if let Some(repo) = chain.find_mut(&id) {
                repo.mark(Step::Stashed);
            }
        }
    }

    let mut headline = format!(
        "\nPerforming {} for {} repositories",
        request.action, built.dep_count
    );
    if !request.build.filter.is_empty() {
        headline.push_str(&format!(" depending on {}", request.build.filter));
    }
    output::print(headline, verbosity);

    let orchestrator = Orchestrator::new(collaborators, request.settings, token);
    let state = orchestrator.run(&mut chain, &request.action).await;

    Ok(Orchestrated {
        chain,
        dep_count: built.dep_count,
        excluded: built.excluded,
        state,
    })
}
