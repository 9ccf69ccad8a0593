//! core
//!
//! Domain types, manifests, and dependency ordering for modfleet.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, ModulePath, SemVer, RepoId
//! - [`manifest`] - Reading module manifests (`go.mod` / `go.sum`)
//! - [`repository`] - The per-run repository entity and step markers
//! - [`chain`] - Topologically ordered repository sequence
//! - [`graph`] - Dependency graph construction and ordering
//! - [`config`] - Configuration schema and loading
//! - [`lock`] - Exclusive fleet lock
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at construction
//! - Graph construction is a pure function of manifest contents
//! - Identical inputs always yield an identical chain

pub mod chain;
pub mod config;
pub mod graph;
pub mod lock;
pub mod manifest;
pub mod repository;
pub mod types;
