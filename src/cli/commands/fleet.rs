//! fleet commands - list, pull, reset, replace, test, workflow, sync
//!
//! Every fleet command is one coordinated run: the flags and config are
//! turned into a [`RunRequest`], production collaborators are wired up and
//! the run is driven on a multi-threaded tokio runtime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};

use crate::cli::args::{Cli, Command, SyncArgs};
use crate::core::config::Config;
use crate::core::graph::{BuildOptions, FilterSet};
use crate::core::manifest::{GoModules, ManifestMode};
use crate::core::types::{BranchName, ModulePath, SemVer};
use crate::engine::{
    default_jobs, Action, ActionClass, Collaborators, RunRequest, RunSettings,
    ShutdownCoordinator, SyncOptions, WorkflowOptions,
};
use crate::forge::ForgePullRequests;
use crate::git::{FsDiscover, GitVcs};
use crate::toolchain::GoTool;
use crate::ui::output::{self, Verbosity};
use crate::ui::prompts::{Confirm, StaticConfirm, TerminalConfirm};
use crate::ui::summary;

/// Run a fleet command and return the process exit code.
pub fn run(cli: &Cli, root: &Path) -> Result<i32> {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.name_only, cli.debug);

    let loaded = Config::load(Some(root)).context("Failed to load config")?;
    for warning in &loaded.warnings {
        output::warn(
            format!("{} ({})", warning.message, warning.path.display()),
            verbosity,
        );
    }
    let config = loaded.config;

    let action = action_for(&cli.command, &config, root)?;
    let build = BuildOptions {
        mode: if cli.direct {
            ManifestMode::Direct
        } else {
            ManifestMode::Recursive
        },
        filter: parse_filter(&cli.filter)?,
        pins: merge_pins(config.pins(), &cli.pin)?,
    };
    let settings = RunSettings {
        jobs: cli.jobs.or(config.jobs()).unwrap_or_else(default_jobs),
        verbosity,
        assume_yes: cli.yes,
    };
    let lock_root = (action.class() != ActionClass::Listing).then(|| root.to_path_buf());

    let request = RunRequest {
        targets: targets(cli, root),
        action,
        build,
        settings,
        lock_root,
    };
    let collaborators = production(&config, cli.yes);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        let coordinator = ShutdownCoordinator::new(collaborators, request);
        let token = coordinator.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted; waiting for in-flight work");
                token.cancel();
            }
        });

        let report = coordinator
            .run_then(|report| summary::print(report, verbosity))
            .await?;
        Ok::<_, anyhow::Error>(report.exit_code())
    })
}

fn production(config: &Config, assume_yes: bool) -> Collaborators {
    let confirm: Arc<dyn Confirm> = if assume_yes {
        Arc::new(StaticConfirm::yes())
    } else {
        Arc::new(TerminalConfirm)
    };
    Collaborators {
        discover: Arc::new(FsDiscover::new(config.remote())),
        manifests: Arc::new(GoModules),
        vcs: Arc::new(GitVcs::new(config.remote())),
        tool: Arc::new(GoTool::new()),
        pull_requests: Arc::new(ForgePullRequests::new(
            config.forge_token(),
            config.forge_api_base(),
        )),
        confirm,
    }
}

fn targets(cli: &Cli, root: &Path) -> Vec<PathBuf> {
    if cli.dirs.is_empty() {
        vec![root.to_path_buf()]
    } else {
        cli.dirs.clone()
    }
}

fn action_for(command: &Command, config: &Config, root: &Path) -> Result<Action> {
    let base = || BranchName::new(config.base_branch()).context("Invalid base branch in config");

    Ok(match command {
        Command::List => Action::List,
        Command::Pull => Action::Pull,
        Command::Reset { base: explicit } => Action::Reset {
            base: match explicit {
                Some(name) => BranchName::new(name.as_str()).context("Invalid --base")?,
                None => base()?,
            },
        },
        Command::Replace => Action::Replace,
        Command::Test => Action::Test,
        Command::Workflow {
            source,
            commit,
            message,
        } => {
            let source = match (source, config.workflow_source()) {
                (Some(source), _) => source.clone(),
                (None, Some(configured)) if configured.is_relative() => root.join(configured),
                (None, Some(configured)) => configured.to_path_buf(),
                (None, None) => bail!("No workflow file: pass --source or set workflow_source"),
            };
            if !source.is_file() {
                bail!("Workflow file {} does not exist", source.display());
            }
            Action::Workflow(WorkflowOptions {
                source,
                commit: *commit,
                message: message
                    .clone()
                    .unwrap_or_else(|| "ci: install workflow".to_string()),
            })
        }
        Command::Sync(args) => Action::Sync(sync_options(args, config, base()?)?),
        Command::Config { .. } | Command::Completion { .. } => {
            bail!("not a fleet command")
        }
    })
}

fn sync_options(args: &SyncArgs, config: &Config, base: BranchName) -> Result<SyncOptions> {
    let message = args
        .message
        .clone()
        .unwrap_or_else(|| config.commit_message().to_string());
    let mut opts = SyncOptions::new(base, message);

    opts.branch = args
        .branch
        .as_deref()
        .map(BranchName::new)
        .transpose()
        .context("Invalid --branch")?;
    opts.commit = args.commit;
    opts.pull_request = args.pr;
    opts.set_version = args
        .set_version
        .as_deref()
        .map(SemVer::parse)
        .transpose()
        .context("Invalid --set-version")?;
    opts.tag = args.tag || opts.set_version.is_some();
    opts.pr_title = config.pr_title();
    opts.pr_body = config.pr_body();
    opts.pr_draft = args.draft || config.pr_draft();
    Ok(opts)
}

fn parse_filter(raw: &[String]) -> Result<FilterSet> {
    raw.iter()
        .map(|m| ModulePath::new(m.as_str()).with_context(|| format!("Invalid --filter {m}")))
        .collect()
}

/// Config pins overlaid with `--pin module@version`.
fn merge_pins(
    mut pins: HashMap<ModulePath, String>,
    raw: &[String],
) -> Result<HashMap<ModulePath, String>> {
    for pin in raw {
        let Some((module, version)) = pin.rsplit_once('@') else {
            bail!("Invalid --pin {pin}: expected MODULE@VERSION");
        };
        if version.is_empty() {
            bail!("Invalid --pin {pin}: empty version");
        }
        let module = ModulePath::new(module).with_context(|| format!("Invalid --pin {pin}"))?;
        pins.insert(module, version.to_string());
    }
    Ok(pins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_pins_override_config() {
        let mut config = HashMap::new();
        config.insert(ModulePath::new("example.com/a").unwrap(), "v1.0.0".to_string());

        let pins = merge_pins(
            config,
            &["example.com/a@v2.0.0".into(), "example.com/b@v0.1.0".into()],
        )
        .unwrap();

        assert_eq!(pins[&ModulePath::new("example.com/a").unwrap()], "v2.0.0");
        assert_eq!(pins[&ModulePath::new("example.com/b").unwrap()], "v0.1.0");
    }

    #[test]
    fn malformed_pins_are_rejected() {
        assert!(merge_pins(HashMap::new(), &["example.com/a".into()]).is_err());
        assert!(merge_pins(HashMap::new(), &["example.com/a@".into()]).is_err());
    }

    #[test]
    fn set_version_implies_tag() {
        let args = SyncArgs {
            set_version: Some("v1.2.3".into()),
            ..SyncArgs::default()
        };
        let opts = sync_options(
            &args,
            &Config::default(),
            BranchName::new("main").unwrap(),
        )
        .unwrap();
        assert!(opts.tag);
        assert_eq!(opts.set_version.unwrap().to_string(), "v1.2.3");
        assert_eq!(opts.message, crate::core::config::DEFAULT_COMMIT_MESSAGE);
    }
}
