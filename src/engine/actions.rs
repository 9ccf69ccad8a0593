//! engine::actions
//!
//! The actions a run can perform and how each one is scheduled.

use std::path::PathBuf;

use super::state::Stage;
use crate::core::types::{BranchName, SemVer};

/// How an action is scheduled across the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    /// Prints the chain; touches nothing.
    Listing,
    /// Repositories are handled on a bounded worker pool in any order.
    Independent,
    /// Repositories are handled one at a time in chain order, because each
    /// one consumes what earlier ones produced.
    OrderCoupled,
}

/// An action split by scheduler. Each scheduler only ever sees the actions
/// it can run, so routing is checked by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule<'a> {
    Listing,
    Pool(PoolTask),
    Sequence(SequencedTask<'a>),
}

/// Work for the worker pool. Owned, because it moves into spawned tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolTask {
    Pull,
    Reset { base: BranchName },
    Workflow(WorkflowOptions),
}

impl PoolTask {
    /// The step a failure of this task is reported against.
    pub fn stage(&self) -> Stage {
        match self {
            PoolTask::Pull => Stage::Pull,
            PoolTask::Reset { .. } => Stage::Reset,
            PoolTask::Workflow(_) => Stage::Workflow,
        }
    }
}

/// Work run one repository at a time in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencedTask<'a> {
    Replace,
    Test,
    Sync(&'a SyncOptions),
}

/// Settings for the sync pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Branch to check out (or create) before updating. `None` stays on the
    /// current branch.
    pub branch: Option<BranchName>,
    pub commit: bool,
    pub pull_request: bool,
    pub tag: bool,
    /// Explicit tag for every repository instead of a patch bump.
    pub set_version: Option<SemVer>,
    pub message: String,
    pub pr_title: Option<String>,
    pub pr_body: Option<String>,
    pub pr_draft: bool,
    /// Base branch pull requests target.
    pub base: BranchName,
}

impl SyncOptions {
    /// Options with every optional step disabled.
    pub fn new(base: BranchName, message: impl Into<String>) -> Self {
        Self {
            branch: None,
            commit: false,
            pull_request: false,
            tag: false,
            set_version: None,
            message: message.into(),
            pr_title: None,
            pr_body: None,
            pr_draft: false,
            base,
        }
    }

    /// The steps a sync will take, as shown before asking for confirmation.
    pub fn plan_lines(&self) -> Vec<String> {
        let mut lines = vec!["Sync action will:".to_string()];
        if let Some(branch) = &self.branch {
            lines.push(format!("- checkout (or create) branch {}", branch));
        }
        lines.push("- update mod files".to_string());
        if self.commit {
            lines.push("- commit local changes (if any)".to_string());
        }
        if self.pull_request {
            lines.push("- open pull request for changes (if any)".to_string());
        }
        if self.tag {
            match &self.set_version {
                Some(version) => lines.push(format!("- tag all dependencies {}", version)),
                None => lines.push("- increment tag version (if updated)".to_string()),
            }
        }
        lines
    }
}

/// Settings for installing a workflow file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// File copied into each repository's `.github/workflows/`.
    pub source: PathBuf,
    pub commit: bool,
    pub message: String,
}

/// What a run does to each repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    List,
    Pull,
    Reset { base: BranchName },
    Replace,
    Test,
    Workflow(WorkflowOptions),
    Sync(SyncOptions),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Pull => "pull",
            Action::Reset { .. } => "reset",
            Action::Replace => "replace",
            Action::Test => "test",
            Action::Workflow(_) => "workflow",
            Action::Sync(_) => "sync",
        }
    }

    pub fn class(&self) -> ActionClass {
        match self {
            Action::List => ActionClass::Listing,
            Action::Pull | Action::Reset { .. } | Action::Workflow(_) => ActionClass::Independent,
            Action::Replace | Action::Test | Action::Sync(_) => ActionClass::OrderCoupled,
        }
    }

    /// The work handed to the scheduler for this action's class.
    pub fn schedule(&self) -> Schedule<'_> {
        match self {
            Action::List => Schedule::Listing,
            Action::Pull => Schedule::Pool(PoolTask::Pull),
            Action::Reset { base } => Schedule::Pool(PoolTask::Reset { base: base.clone() }),
            Action::Workflow(opts) => Schedule::Pool(PoolTask::Workflow(opts.clone())),
            Action::Replace => Schedule::Sequence(SequencedTask::Replace),
            Action::Test => Schedule::Sequence(SequencedTask::Test),
            Action::Sync(opts) => Schedule::Sequence(SequencedTask::Sync(opts)),
        }
    }

    /// Whether pinned repositories are left alone.
    pub fn skips_pinned(&self) -> bool {
        matches!(self, Action::Pull | Action::Sync(_))
    }

    /// Whether the user must confirm before any repository is touched.
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, Action::Sync(_))
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BranchName {
        BranchName::new("main").unwrap()
    }

    #[test]
    fn classes() {
        assert_eq!(Action::List.class(), ActionClass::Listing);
        assert_eq!(Action::Pull.class(), ActionClass::Independent);
        assert_eq!(Action::Reset { base: base() }.class(), ActionClass::Independent);
        assert_eq!(Action::Test.class(), ActionClass::OrderCoupled);
        assert_eq!(
            Action::Sync(SyncOptions::new(base(), "m")).class(),
            ActionClass::OrderCoupled
        );
    }

    #[test]
    fn schedule_agrees_with_class() {
        let workflow = WorkflowOptions {
            source: PathBuf::from("ci.yml"),
            commit: false,
            message: "m".into(),
        };
        let actions = vec![
            Action::List,
            Action::Pull,
            Action::Reset { base: base() },
            Action::Replace,
            Action::Test,
            Action::Workflow(workflow),
            Action::Sync(SyncOptions::new(base(), "m")),
        ];
        for action in &actions {
            let class = match action.schedule() {
                Schedule::Listing => ActionClass::Listing,
                Schedule::Pool(_) => ActionClass::Independent,
                Schedule::Sequence(_) => ActionClass::OrderCoupled,
            };
            assert_eq!(class, action.class(), "{action}");
        }
    }

    #[test]
    fn pool_tasks_carry_their_stage() {
        let Schedule::Pool(task) = (Action::Reset { base: base() }).schedule() else {
            panic!("reset runs on the pool");
        };
        assert_eq!(task, PoolTask::Reset { base: base() });
        assert_eq!(task.stage(), Stage::Reset);
        let Schedule::Pool(task) = Action::Pull.schedule() else {
            panic!("pull runs on the pool");
        };
        assert_eq!(task.stage(), Stage::Pull);
    }

    #[test]
    fn minimal_plan() {
        let opts = SyncOptions::new(base(), "m");
        assert_eq!(opts.plan_lines(), vec!["Sync action will:", "- update mod files"]);
    }

    #[test]
    fn full_plan() {
        let opts = SyncOptions {
            branch: Some(BranchName::new("deps").unwrap()),
            commit: true,
            pull_request: true,
            tag: true,
            set_version: Some(SemVer::parse("v2.0.0").unwrap()),
            ..SyncOptions::new(base(), "m")
        };
        assert_eq!(
            opts.plan_lines(),
            vec![
                "Sync action will:",
                "- checkout (or create) branch deps",
                "- update mod files",
                "- commit local changes (if any)",
                "- open pull request for changes (if any)",
                "- tag all dependencies v2.0.0",
            ]
        );
    }

    #[test]
    fn bump_plan() {
        let opts = SyncOptions {
            tag: true,
            ..SyncOptions::new(base(), "m")
        };
        assert_eq!(
            opts.plan_lines().last().map(String::as_str),
            Some("- increment tag version (if updated)")
        );
    }
}
