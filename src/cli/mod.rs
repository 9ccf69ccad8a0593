//! cli
//!
//! Command-line interface layer for modfleet.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install diagnostic logging
//! - Delegate to command handlers
//! - Does NOT touch repositories directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, wires production
//! collaborators and hands the run to [`crate::engine`].

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable with a `tracing` filter directive.
pub const LOG_ENV: &str = "MODFLEET_LOG";

/// Run the CLI application and return the process exit code.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<i32> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);
    commands::dispatch(cli)
}

/// Install the global subscriber, writing to stderr.
///
/// `MODFLEET_LOG` wins when set; otherwise `--debug` selects `debug` and the
/// default is `warn`. Only the first call takes effect.
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
}
