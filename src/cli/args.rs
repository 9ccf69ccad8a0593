//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--dir <path>`: Directory to search for repositories (repeatable)
//! - `--filter` / `-f <module>`: Only repositories depending on a module
//! - `--direct`: Use only go.mod requirements, not go.sum
//! - `--jobs` / `-j <n>`: Worker pool size for independent actions
//! - `--pin <module@version>`: Leave a module at a fixed version
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--name-only`: Print only the names of touched repositories
//! - `--yes` / `-y`: Do not ask for confirmation

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// modfleet - run Go module maintenance across a fleet of repositories in
/// dependency order
#[derive(Parser, Debug)]
#[command(name = "modfleet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to search for git repositories (default: current directory)
    #[arg(long = "dir", short = 'd', global = true, value_name = "PATH")]
    pub dirs: Vec<PathBuf>,

    /// Only include repositories that depend on this module
    #[arg(long, short = 'f', global = true, value_name = "MODULE")]
    pub filter: Vec<String>,

    /// Only consider dependencies declared directly in go.mod
    #[arg(long, global = true)]
    pub direct: bool,

    /// Number of repositories processed at once by independent actions
    #[arg(long, short = 'j', global = true, value_name = "N")]
    pub jobs: Option<usize>,

    /// Pin a module to a version; pinned repositories are never bumped
    #[arg(long, global = true, value_name = "MODULE@VERSION")]
    pub pin: Vec<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print only the names of repositories the action touched
    #[arg(long, global = true)]
    pub name_only: bool,

    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List repositories in dependency order
    #[command(
        name = "list",
        long_about = "List repositories in dependency order.\n\n\
            Every repository is printed after the repositories it depends on. \
            Nothing is changed. Use this to preview the order any other action \
            will use.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Order of everything under ~/src/fleet
    modfleet --dir ~/src/fleet list

    # Only repositories that depend on a module
    modfleet -f example.com/core list

    # Remote names only, for scripting
    modfleet --name-only list"
    )]
    List,

    /// Pull the current branch of every repository
    #[command(
        name = "pull",
        long_about = "Fetch and fast-forward the current branch of every repository.\n\n\
            Repositories are handled in parallel. Pinned repositories are skipped."
    )]
    Pull,

    /// Check out the base branch and reset it to the remote
    #[command(
        name = "reset",
        long_about = "Check out the base branch and hard-reset it to its remote-tracking \
            branch.\n\n\
            Local changes are shelved before the run and restored afterwards."
    )]
    Reset {
        /// Branch to reset to (default: configured base branch)
        #[arg(long, value_name = "BRANCH")]
        base: Option<String>,
    },

    /// Point dependencies at their local working trees
    #[command(
        name = "replace",
        long_about = "Add a go.mod replace directive for every dependency that is part \
            of the fleet, pointing at its local checkout."
    )]
    Replace,

    /// Run tests against local copies of dependencies
    #[command(
        name = "test",
        long_about = "Run `go test ./...` in dependency order.\n\n\
            Dependencies that are part of the fleet are replaced by their local \
            checkouts for the duration of the test, then the replaces are removed again."
    )]
    Test,

    /// Install a workflow file into every repository
    #[command(
        name = "workflow",
        after_help = "\
WORKFLOW EXAMPLES:
    # Copy ci/go.yml into .github/workflows/ everywhere and push it
    modfleet workflow --source ci/go.yml --commit"
    )]
    Workflow {
        /// Workflow file to install (default: configured workflow_source)
        #[arg(long, value_name = "FILE")]
        source: Option<PathBuf>,

        /// Commit and push the installed file
        #[arg(long)]
        commit: bool,

        /// Commit message
        #[arg(long, short = 'm')]
        message: Option<String>,
    },

    /// Propagate new versions through the fleet
    #[command(
        name = "sync",
        long_about = "Update every repository to the versions its dependencies resolve to \
            in this run, in dependency order.\n\n\
            For each repository: check out the branch, require the new dependency \
            versions, commit, push, open a pull request and tag, as configured. \
            The plan is shown and must be confirmed before anything changes.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bump, commit and tag everything that changed
    modfleet sync --commit --tag

    # Same, on a branch with pull requests
    modfleet sync --branch deps/bump --commit --pr

    # Release the whole fleet at one version
    modfleet sync --commit --tag --set-version v1.4.0"
    )]
    Sync(SyncArgs),

    /// Show or create configuration
    #[command(
        name = "config",
        long_about = "Show or create modfleet configuration.\n\n\
            Global configuration lives in ~/.modfleet/config.toml. Workspace \
            configuration lives in .modfleet/config.toml under the first --dir.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Where configuration is read from
    modfleet config path

    # Effective values
    modfleet config show

    # Start a workspace config
    modfleet config init"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    modfleet completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    modfleet completion zsh >> ~/.zshrc

    # Fish
    modfleet completion fish > ~/.config/fish/completions/modfleet.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Sync flags.
#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Branch to check out or create before updating
    #[arg(long, short = 'b', value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Commit changes
    #[arg(long, short = 'c')]
    pub commit: bool,

    /// Open a pull request for committed changes
    #[arg(long)]
    pub pr: bool,

    /// Open pull requests as drafts
    #[arg(long, requires = "pr")]
    pub draft: bool,

    /// Tag repositories that changed with the next patch version
    #[arg(long, short = 't')]
    pub tag: bool,

    /// Tag every repository with this version instead (implies --tag)
    #[arg(long, value_name = "VERSION")]
    pub set_version: Option<String>,

    /// Commit message
    #[arg(long, short = 'm')]
    pub message: Option<String>,
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the config file locations
    Path,
    /// Print the effective configuration
    Show,
    /// Write a workspace config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "modfleet", "list", "--dir", "/a", "--dir", "/b", "-f", "example.com/x",
        ])
        .unwrap();
        assert_eq!(cli.dirs, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(cli.filter, vec!["example.com/x".to_string()]);
        assert!(matches!(cli.command, Command::List));
    }

    #[test]
    fn sync_flags() {
        let cli = Cli::try_parse_from([
            "modfleet",
            "sync",
            "--branch",
            "deps",
            "--commit",
            "--pr",
            "--set-version",
            "v1.2.0",
        ])
        .unwrap();
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.branch.as_deref(), Some("deps"));
        assert!(args.commit && args.pr && !args.tag);
        assert_eq!(args.set_version.as_deref(), Some("v1.2.0"));
    }

    #[test]
    fn draft_requires_pr() {
        assert!(Cli::try_parse_from(["modfleet", "sync", "--draft"]).is_err());
    }
}
