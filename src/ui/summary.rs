//! ui::summary
//!
//! End-of-run summary for a [`RunReport`].

use crate::engine::RunReport;

use super::output::{self, Verbosity};

/// One line of the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Something went wrong; goes to stderr and survives `--quiet`.
    Problem(String),
    Status(String),
}

impl Line {
    pub fn text(&self) -> &str {
        match self {
            Line::Problem(text) | Line::Status(text) => text,
        }
    }
}

/// Build the summary.
///
/// Problems come first so they are the first thing read after the
/// per-repository output; the tally is last.
pub fn lines(report: &RunReport) -> Vec<Line> {
    let mut lines = Vec::new();

    if let Some(failure) = report.failure() {
        lines.push(Line::Problem(format!("Run failed: {failure}")));
    }

    if !report.errors().is_empty() {
        lines.push(Line::Problem(format!("{} error(s):", report.errors().len())));
        lines.extend(report.errors().iter().map(|e| Line::Problem(format!("  - {e}"))));
    }

    if let Some(cleanup) = report.cleanup_failure() {
        lines.push(Line::Problem(format!("Cleanup failed: {cleanup}")));
        lines.push(Line::Problem(
            "  Run `git stash list` in those repositories to recover.".to_string(),
        ));
    }

    if report.declined() {
        return lines;
    }
    if report.cancelled() {
        lines.push(Line::Status(
            "Interrupted; remaining repositories were not processed.".to_string(),
        ));
    }

    let tally = report.tally();
    if tally.total() > 0 {
        lines.push(Line::Status(format!(
            "Done: {} succeeded, {} skipped, {} failed",
            tally.succeeded, tally.skipped, tally.failed
        )));
    }
    lines
}

/// Print the summary.
pub fn print(report: &RunReport, verbosity: Verbosity) {
    let lines = lines(report);
    if lines.is_empty() {
        return;
    }
    output::print("", verbosity);
    for line in lines {
        match line {
            Line::Problem(text) => output::error(text),
            Line::Status(text) => output::print(text, verbosity),
        }
    }

    if verbosity == Verbosity::Debug {
        for notice in report.notices() {
            output::print(format!("note: {notice}"), verbosity);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use crate::core::manifest::{InMemoryManifests, Manifest};
    use crate::core::repository::DiscoveredRepo;
    use crate::core::types::{BranchName, ModulePath};
    use crate::engine::{Action, Collaborators, RunRequest, RunSettings, ShutdownCoordinator, SyncOptions};
    use crate::forge::mock::MockForge;
    use crate::git::mock::{MockVcs, StaticDiscover, VcsOp};
    use crate::toolchain::mock::MockModTool;
    use crate::ui::prompts::StaticConfirm;

    fn coordinator(vcs: MockVcs, confirm: StaticConfirm, action: Action) -> ShutdownCoordinator {
        let mut manifests = InMemoryManifests::new();
        let mut repos = Vec::new();
        for name in ["a", "b"] {
            let path = PathBuf::from(format!("/fleet/{name}"));
            manifests.insert(
                &path,
                Manifest::new(ModulePath::new(format!("example.com/{name}")).unwrap()),
            );
            repos.push(DiscoveredRepo::new(path));
        }
        let collaborators = Collaborators {
            discover: Arc::new(StaticDiscover::new(repos)),
            manifests: Arc::new(manifests),
            vcs: Arc::new(vcs),
            tool: Arc::new(MockModTool::new()),
            pull_requests: Arc::new(MockForge::new()),
            confirm: Arc::new(confirm),
        };
        let mut request = RunRequest::new(vec![PathBuf::from("/fleet")], action);
        request.settings = RunSettings {
            jobs: 2,
            verbosity: Verbosity::Quiet,
            assume_yes: false,
        };
        ShutdownCoordinator::new(collaborators, request)
    }

    async fn report(vcs: MockVcs, confirm: StaticConfirm, action: Action) -> RunReport {
        coordinator(vcs, confirm, action).run().await.unwrap()
    }

    #[tokio::test]
    async fn errors_first_tally_last() {
        let vcs = MockVcs::new();
        vcs.fail_on("/fleet/a", VcsOp::Pull);

        let lines: Vec<String> = lines(&report(vcs, StaticConfirm::yes(), Action::Pull).await)
            .iter()
            .map(|l| l.text().to_string())
            .collect();

        assert_eq!(lines[0], "1 error(s):");
        assert!(lines[1].starts_with("  - /fleet/a"), "{lines:?}");
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Done: 1 succeeded, 0 skipped, 1 failed")
        );
    }

    #[tokio::test]
    async fn declined_run_has_nothing_to_say() {
        let action = Action::Sync(SyncOptions::new(BranchName::new("main").unwrap(), "m"));
        let report = report(MockVcs::new(), StaticConfirm::no(), action).await;

        assert!(report.declined());
        assert!(lines(&report).is_empty());
    }

    #[tokio::test]
    async fn interruption_is_not_a_problem() {
        let vcs = MockVcs::new();
        vcs.fail_on("/fleet/a", VcsOp::Stash);
        let coordinator = coordinator(vcs, StaticConfirm::yes(), Action::Pull);
        coordinator.cancel_token().cancel();

        let report = coordinator.run().await.unwrap();
        assert!(report.has_failures() && report.cancelled());

        let lines = lines(&report);
        let problems: Vec<&str> = lines
            .iter()
            .filter(|l| matches!(l, Line::Problem(_)))
            .map(Line::text)
            .collect();
        assert_eq!(problems.len(), 2, "{lines:?}");
        assert_eq!(problems[0], "1 error(s):");
        assert!(lines.contains(&Line::Status(
            "Interrupted; remaining repositories were not processed.".to_string()
        )));
        assert!(matches!(lines.last(), Some(Line::Status(done)) if done.starts_with("Done:")));
    }
}
