//! engine::orchestrator
//!
//! Walks the chain and executes one action per repository.
//!
//! # Scheduling
//!
//! - Listing actions print the chain and touch nothing.
//! - Independent actions fan out over a worker pool bounded by a
//!   [`Semaphore`]; tasks live in a [`JoinSet`] and `run` returns only once
//!   every dispatched task has completed.
//! - Order-coupled actions run one repository at a time, in chain order, on
//!   the calling task.
//!
//! # Cancellation
//!
//! The token is checked before dispatching each pool task, at the start of
//! each pool task and before every pipeline step. Once it is set nothing new
//! starts; work already in flight finishes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::actions::{Action, PoolTask, Schedule, SequencedTask};
use super::pipeline::{Progress, SyncPipeline};
use super::state::{OrchestrationState, Outcome, StepFailure};
use super::{tasks, Collaborators, RunSettings};
use crate::core::chain::Chain;
use crate::core::repository::Repository;
use crate::core::types::ModulePath;
use crate::ui::output::{self, Verbosity};

/// Executes actions over a chain.
pub struct Orchestrator {
    collaborators: Collaborators,
    settings: RunSettings,
    token: CancellationToken,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, settings: RunSettings, token: CancellationToken) -> Self {
        Self {
            collaborators,
            settings,
            token,
        }
    }

    /// Run `action` over every repository in `chain`, recording step markers
    /// on the chain's repositories.
    pub async fn run(&self, chain: &mut Chain, action: &Action) -> OrchestrationState {
        let mut state = OrchestrationState::new(chain.len(), self.token.clone());

        if action.needs_confirmation() && !self.confirmed(chain, action).await {
            state.set_declined();
            output::print("Aborted, nothing was changed.", self.settings.verbosity);
            return state;
        }

        let skips_pinned = action.skips_pinned();
        match action.schedule() {
            Schedule::Listing => self.list(chain),
            Schedule::Pool(task) => self.run_pool(chain, task, skips_pinned, &state).await,
            Schedule::Sequence(task) => {
                self.run_sequential(chain, task, skips_pinned, &state).await
            }
        }

        for repo in chain.iter() {
            if matches!(action, Action::List) || repo.was_touched() {
                output::name(repo.remote_name(), self.settings.verbosity);
            }
        }
        state
    }

    /// Show what is about to happen and ask. `--yes` skips the question but
    /// not the listing.
    async fn confirmed(&self, chain: &Chain, action: &Action) -> bool {
        let mut text: Vec<String> = chain
            .iter()
            .enumerate()
            .map(|(i, repo)| format!("{}) {}", i + 1, repo.remote_name()))
            .collect();
        if let Action::Sync(opts) = action {
            text.push(String::new());
            text.push(opts.plan_lines().join("\n  "));
        }
        let text = text.join("\n");

        if self.settings.assume_yes {
            output::print(text, self.settings.verbosity);
            return true;
        }
        // The question must be answerable, so the listing ignores verbosity.
        println!("{}", text);
        self.collaborators.confirm.confirm("\nIs this ok?").await
    }

    fn list(&self, chain: &Chain) {
        let total = chain.len();
        for (i, repo) in chain.iter().enumerate() {
            output::print(
                output::position_line(i + 1, total, repo.path().display()),
                self.settings.verbosity,
            );
        }
    }

    fn heading(&self, index: usize, total: usize, repo: &Repository) {
        heading(self.settings.verbosity, index, total, repo);
    }

    async fn run_pool(
        &self,
        chain: &mut Chain,
        task: PoolTask,
        skips_pinned: bool,
        state: &OrchestrationState,
    ) {
        let total = chain.len();
        let semaphore = Arc::new(Semaphore::new(self.settings.jobs.max(1)));
        let mut set: JoinSet<(usize, Option<Repository>)> = JoinSet::new();

        for (index, repo) in chain.iter().enumerate() {
            if self.token.is_cancelled() {
                state.count_many(Outcome::Skipped, total - index);
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let collaborators = self.collaborators.clone();
            let task = task.clone();
            let state = state.clone();
            let token = self.token.clone();
            let verbosity = self.settings.verbosity;
            let mut repo = repo.clone();

            set.spawn(async move {
                let _permit = permit;
                if token.is_cancelled() {
                    state.count(Outcome::Skipped);
                    return (index, None);
                }
                heading(verbosity, index, total, &repo);
                if skips_pinned && skip_pinned(verbosity, &repo, &state) {
                    return (index, None);
                }

                // Run the work on its own task so a panic is reported against
                // this repository instead of tearing down the pool.
                let id = repo.id().clone();
                let stage = task.stage();
                let worker = tokio::spawn(async move {
                    let result = match &task {
                        PoolTask::Pull => tasks::pull(&collaborators, &mut repo).await,
                        PoolTask::Reset { base } => {
                            tasks::reset(&collaborators, &mut repo, base).await
                        }
                        PoolTask::Workflow(opts) => {
                            tasks::workflow(&collaborators, &mut repo, opts).await
                        }
                    };
                    (repo, result)
                });

                match worker.await {
                    Ok((repo, result)) => {
                        record(&state, result);
                        (index, Some(repo))
                    }
                    Err(e) => {
                        record(&state, Err(StepFailure::new(&id, stage, format!("task failed: {e}"))));
                        (index, None)
                    }
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Some(repo))) => {
                    if let Some(slot) = chain.get_mut(index) {
                        *slot = repo;
                    }
                }
                Ok((_, None)) => {}
                Err(e) => tracing::error!(error = %e, "pool task failed"),
            }
        }
    }

    async fn run_sequential(
        &self,
        chain: &mut Chain,
        task: SequencedTask<'_>,
        skips_pinned: bool,
        state: &OrchestrationState,
    ) {
        let total = chain.len();
        let mut resolved: HashMap<ModulePath, String> = HashMap::new();

        for index in 0..total {
            if self.token.is_cancelled() {
                state.count_many(Outcome::Skipped, total - index);
                break;
            }
            let earlier = chain.before(index).to_vec();
            let Some(repo) = chain.get_mut(index) else {
                break;
            };
            self.heading(index, total, repo);

            if skips_pinned && skip_pinned(self.settings.verbosity, repo, state) {
                if let Some(pin) = repo.pinned_version() {
                    resolved.insert(repo.module().clone(), pin.to_string());
                }
                continue;
            }

            let result = match task {
                SequencedTask::Replace => tasks::replace(&self.collaborators, repo, &earlier).await,
                SequencedTask::Test => tasks::test(&self.collaborators, repo, &earlier, state).await,
                SequencedTask::Sync(opts) => {
                    let pipeline = SyncPipeline {
                        collaborators: &self.collaborators,
                        options: opts,
                        token: &self.token,
                        verbosity: self.settings.verbosity,
                    };
                    match pipeline.run(repo, &resolved).await {
                        Ok(Progress::Finished(reference)) => {
                            if let Some(reference) = reference {
                                resolved.insert(repo.module().clone(), reference);
                            }
                            Ok(())
                        }
                        Ok(Progress::Interrupted) => {
                            state.notice(repo.id(), "cancelled");
                            state.count(Outcome::Skipped);
                            state.count_many(Outcome::Skipped, total - index - 1);
                            break;
                        }
                        Err(failure) => Err(failure),
                    }
                }
            };
            record(state, result);
        }
    }
}

fn heading(verbosity: Verbosity, index: usize, total: usize, repo: &Repository) {
    output::print("", verbosity);
    output::print(
        output::position_line(index + 1, total, repo.path().display()),
        verbosity,
    );
}

/// Pinned repositories are left alone by version-changing actions.
fn skip_pinned(verbosity: Verbosity, repo: &Repository, state: &OrchestrationState) -> bool {
    match repo.pinned_version() {
        Some(pin) => {
            let message = format!("Already has version set: {}", pin);
            output::print(&message, verbosity);
            state.notice(repo.id(), message);
            state.count(Outcome::Skipped);
            true
        }
        None => false,
    }
}

fn record(state: &OrchestrationState, result: Result<(), StepFailure>) {
    match result {
        Ok(()) => state.count(Outcome::Succeeded),
        Err(failure) => {
            state.fail(failure);
            state.count(Outcome::Failed);
        }
    }
}
