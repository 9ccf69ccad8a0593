//! modfleet - dependency-ordered maintenance for a fleet of Go module repositories
//!
//! modfleet discovers the git repositories under a set of directories, works
//! out which of them depend on which from their `go.mod` / `go.sum`, and runs
//! one action over all of them in dependency order: listing, pulling,
//! resetting, local replaces, tests, workflow installation, or a full
//! version sync with commits, tags and pull requests.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, wires collaborators)
//! - [`engine`] - Discover → Shelve → Build → Orchestrate → Restore lifecycle
//! - [`core`] - Domain types, dependency graph, chain, config, fleet lock
//! - [`git`] - Repository discovery and version control
//! - [`toolchain`] - Go module tooling
//! - [`forge`] - Pull requests on the hosting provider (GitHub)
//! - [`ui`] - Output, prompts and the run summary
//!
//! # Correctness Invariants
//!
//! 1. Every repository is handled after every in-fleet repository it depends on
//! 2. Local changes are shelved once before a run and restored once after it
//! 3. A failure in one repository never aborts the others
//! 4. Cancellation never interrupts a step halfway

pub mod cli;
pub mod core;
pub mod engine;
pub mod forge;
pub mod git;
pub mod toolchain;
pub mod ui;
