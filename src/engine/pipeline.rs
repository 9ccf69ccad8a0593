//! engine::pipeline
//!
//! The sync pipeline for one repository.
//!
//! ```text
//! branch -> fast-forward -> update -> commit -> push -> pull request
//!        -> drop unused branch -> tag
//! ```
//!
//! The cancellation token is checked before every step. A failing step
//! returns a [`StepFailure`] and the remaining steps are abandoned.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use super::actions::SyncOptions;
use super::state::{AtStage, Stage, StepFailure};
use super::Collaborators;
use crate::core::repository::{Repository, Step};
use crate::core::types::{BranchName, ModulePath, SemVer};
use crate::forge::CreatePrRequest;
use crate::ui::output::{self, Verbosity};

/// How far a pipeline got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Progress {
    /// Every step ran. Carries the reference dependents should require.
    Finished(Option<String>),
    /// Cancellation was observed before a step.
    Interrupted,
}

pub(crate) struct SyncPipeline<'a> {
    pub(crate) collaborators: &'a Collaborators,
    pub(crate) options: &'a SyncOptions,
    pub(crate) token: &'a CancellationToken,
    pub(crate) verbosity: Verbosity,
}

macro_rules! checkpoint {
    ($self:ident) => {
        if $self.token.is_cancelled() {
            return Ok(Progress::Interrupted);
        }
    };
}

impl SyncPipeline<'_> {
    /// Run every step for `repo`.
    ///
    /// `resolved` holds the references produced by earlier chain members.
    pub(crate) async fn run(
        &self,
        repo: &mut Repository,
        resolved: &HashMap<ModulePath, String>,
    ) -> Result<Progress, StepFailure> {
        let vcs = &self.collaborators.vcs;
        let path = repo.path().to_path_buf();
        let id = repo.id().clone();
        let opts = self.options;

        checkpoint!(self);
        let original = vcs.current_branch(&path).await.at(&id, Stage::Checkout)?;
        let mut created = false;
        let working = match &opts.branch {
            Some(branch) => {
                created = vcs
                    .checkout_branch(&path, branch, true)
                    .await
                    .at(&id, Stage::Checkout)?;
                Some(branch.clone())
            }
            None => original.clone(),
        };

        checkpoint!(self);
        if let Some(branch) = &working {
            if vcs
                .fast_forward(&path, branch)
                .await
                .at(&id, Stage::Synchronize)?
            {
                tracing::debug!(repo = %id, %branch, "fast-forwarded from upstream");
            }
        }

        checkpoint!(self);
        self.update(repo, resolved).await?;

        checkpoint!(self);
        if opts.commit && repo.has(Step::Updated) {
            vcs.commit(&path, &opts.message)
                .await
                .at(&id, Stage::Commit)?;
            repo.mark(Step::Committed);
        }

        checkpoint!(self);
        if repo.has(Step::Committed) {
            let branch = working
                .as_ref()
                .ok_or_else(|| StepFailure::new(&id, Stage::Push, "HEAD is detached"))?;
            vcs.push(&path, branch).await.at(&id, Stage::Push)?;
            repo.mark(Step::Pushed);
        }

        checkpoint!(self);
        if let Some(branch) = working.as_ref().filter(|b| **b != opts.base) {
            if opts.pull_request && repo.has(Step::Committed) {
                self.open_pull_request(repo, branch).await?;
            }
        }

        checkpoint!(self);
        if created && !repo.has(Step::Committed) {
            if let Some(branch) = &working {
                let back = original.clone().unwrap_or_else(|| opts.base.clone());
                vcs.checkout_branch(&path, &back, false)
                    .await
                    .at(&id, Stage::DeleteBranch)?;
                vcs.delete_branch(&path, branch)
                    .await
                    .at(&id, Stage::DeleteBranch)?;
                tracing::debug!(repo = %id, %branch, "removed unused branch");
            }
        }

        checkpoint!(self);
        let tagged = self.tag(repo).await?;

        let reference = match tagged {
            Some(version) => Some(version.to_string()),
            None if repo.has(Step::Pushed) => working.map(|b| b.to_string()),
            None => vcs
                .latest_tag(&path)
                .await
                .at(&id, Stage::Tag)?
                .map(|v| v.to_string()),
        };
        Ok(Progress::Finished(reference))
    }

    /// Require the versions earlier chain members resolved, then tidy.
    async fn update(
        &self,
        repo: &mut Repository,
        resolved: &HashMap<ModulePath, String>,
    ) -> Result<(), StepFailure> {
        let tool = &self.collaborators.tool;
        let id = repo.id().clone();
        let bumps: Vec<(ModulePath, String)> = repo
            .requirements()
            .iter()
            .filter_map(|(module, req)| {
                resolved
                    .get(module)
                    .filter(|version| **version != req.version)
                    .map(|version| (module.clone(), version.clone()))
            })
            .collect();

        for (module, version) in &bumps {
            tracing::debug!(repo = %id, %module, %version, "requiring");
            tool.require(repo.path(), module, version)
                .await
                .at(&id, Stage::Update)?;
        }
        if !bumps.is_empty() {
            tool.tidy(repo.path()).await.at(&id, Stage::Update)?;
        }

        if self
            .collaborators
            .vcs
            .has_changes(repo.path())
            .await
            .at(&id, Stage::Update)?
        {
            repo.mark(Step::Updated);
        }
        Ok(())
    }

    async fn open_pull_request(
        &self,
        repo: &mut Repository,
        branch: &BranchName,
    ) -> Result<(), StepFailure> {
        let opts = self.options;
        let request = CreatePrRequest {
            head: branch.to_string(),
            base: opts.base.to_string(),
            title: opts
                .pr_title
                .clone()
                .unwrap_or_else(|| opts.message.clone()),
            body: opts.pr_body.clone(),
            draft: opts.pr_draft,
        };
        let pr = self
            .collaborators
            .pull_requests
            .open(repo, request)
            .await
            .at(repo.id(), Stage::PullRequest)?;
        output::print(
            format!("Pull request #{}: {}", pr.number, pr.url),
            self.verbosity,
        );
        repo.mark(Step::PrOpened);
        Ok(())
    }

    /// Tag when configured: the explicit version, or the next patch release
    /// when this run committed something.
    async fn tag(&self, repo: &mut Repository) -> Result<Option<SemVer>, StepFailure> {
        let opts = self.options;
        if !opts.tag {
            return Ok(None);
        }
        let vcs = &self.collaborators.vcs;
        let id = repo.id().clone();

        let version = match &opts.set_version {
            Some(version) => version.clone(),
            None if repo.has(Step::Committed) => {
                let latest = vcs.latest_tag(repo.path()).await.at(&id, Stage::Tag)?;
                latest.unwrap_or_else(initial_version).bump_patch()
            }
            None => return Ok(None),
        };

        vcs.tag(repo.path(), &version).await.at(&id, Stage::Tag)?;
        output::print(format!("Tagged {}", version), self.verbosity);
        repo.mark(Step::Tagged);
        Ok(Some(version))
    }
}

fn initial_version() -> SemVer {
    SemVer {
        major: 0,
        minor: 0,
        patch: 0,
        pre: None,
    }
}
