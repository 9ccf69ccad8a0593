//! engine::tasks
//!
//! Per-repository work for every action except sync.

use std::path::Path;

use super::actions::WorkflowOptions;
use super::state::{AtStage, OrchestrationState, Stage, StepFailure};
use super::Collaborators;
use crate::core::repository::{Repository, Step};
use crate::core::types::{BranchName, ModulePath};

/// Where workflow files are installed, relative to the repository root.
const WORKFLOW_DIR: &str = ".github/workflows";

pub(crate) async fn pull(c: &Collaborators, repo: &mut Repository) -> Result<(), StepFailure> {
    c.vcs.pull(repo.path()).await.at(repo.id(), Stage::Pull)?;
    repo.mark(Step::Updated);
    Ok(())
}

pub(crate) async fn reset(
    c: &Collaborators,
    repo: &mut Repository,
    base: &BranchName,
) -> Result<(), StepFailure> {
    c.vcs
        .reset_to_base(repo.path(), base)
        .await
        .at(repo.id(), Stage::Reset)?;
    repo.mark(Step::Reset);
    Ok(())
}

/// Install the workflow file and optionally commit and push it.
pub(crate) async fn workflow(
    c: &Collaborators,
    repo: &mut Repository,
    opts: &WorkflowOptions,
) -> Result<(), StepFailure> {
    let id = repo.id().clone();
    let file_name = opts.source.file_name().ok_or_else(|| {
        StepFailure::new(
            &id,
            Stage::Workflow,
            format!("{} is not a file", opts.source.display()),
        )
    })?;
    let dir = repo.path().join(WORKFLOW_DIR);
    let dest = dir.join(file_name);

    let contents = tokio::fs::read(&opts.source)
        .await
        .at(&id, Stage::Workflow)?;
    let current = tokio::fs::read(&dest).await.ok();
    if current.as_deref() != Some(contents.as_slice()) {
        tokio::fs::create_dir_all(&dir).await.at(&id, Stage::Workflow)?;
        tokio::fs::write(&dest, &contents)
            .await
            .at(&id, Stage::Workflow)?;
        repo.mark(Step::Updated);
    }

    if !opts.commit || !c.vcs.has_changes(repo.path()).await.at(&id, Stage::Commit)? {
        return Ok(());
    }
    c.vcs
        .commit(repo.path(), &opts.message)
        .await
        .at(&id, Stage::Commit)?;
    repo.mark(Step::Committed);

    let branch = c
        .vcs
        .current_branch(repo.path())
        .await
        .at(&id, Stage::Push)?
        .ok_or_else(|| StepFailure::new(&id, Stage::Push, "HEAD is detached"))?;
    c.vcs.push(repo.path(), &branch).await.at(&id, Stage::Push)?;
    repo.mark(Step::Pushed);
    Ok(())
}

/// Point every dependency provided by an earlier chain member at its local
/// working tree. Returns the modules replaced, in chain order.
///
/// On failure the replacements already applied are left for the caller to
/// drop; they are reported through `applied`.
async fn apply_replaces(
    c: &Collaborators,
    repo: &Repository,
    earlier: &[Repository],
    applied: &mut Vec<ModulePath>,
) -> Result<(), StepFailure> {
    for dep in earlier.iter().filter(|d| repo.depends_on(d.module())) {
        c.tool
            .replace(repo.path(), dep.module(), dep.path())
            .await
            .at(repo.id(), Stage::Replace)?;
        applied.push(dep.module().clone());
    }
    Ok(())
}

pub(crate) async fn replace(
    c: &Collaborators,
    repo: &mut Repository,
    earlier: &[Repository],
) -> Result<(), StepFailure> {
    let mut applied = Vec::new();
    apply_replaces(c, repo, earlier, &mut applied).await?;
    if !applied.is_empty() {
        repo.mark(Step::Updated);
    }
    Ok(())
}

/// Run the test suite against local copies of earlier chain members.
///
/// Replacements are always dropped again, also when testing fails. A drop
/// failure after a test failure is logged as a second failure.
pub(crate) async fn test(
    c: &Collaborators,
    repo: &mut Repository,
    earlier: &[Repository],
    state: &OrchestrationState,
) -> Result<(), StepFailure> {
    let mut applied = Vec::new();
    let outcome = match apply_replaces(c, repo, earlier, &mut applied).await {
        Ok(()) => c.tool.test(repo.path()).await.at(repo.id(), Stage::Test),
        Err(failure) => Err(failure),
    };

    let dropped = drop_replaces(c, repo.path(), &applied)
        .await
        .at(repo.id(), Stage::Replace);

    match (outcome, dropped) {
        (Ok(()), Ok(())) => {
            repo.mark(Step::Tested);
            Ok(())
        }
        (Ok(()), Err(drop_failure)) => Err(drop_failure),
        (Err(failure), Ok(())) => Err(failure),
        (Err(failure), Err(drop_failure)) => {
            state.fail(drop_failure);
            Err(failure)
        }
    }
}

async fn drop_replaces(
    c: &Collaborators,
    path: &Path,
    modules: &[ModulePath],
) -> Result<(), crate::toolchain::ToolError> {
    let mut first_error = None;
    for module in modules {
        if let Err(e) = c.tool.drop_replace(path, module).await {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
