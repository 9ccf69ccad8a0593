//! forge
//!
//! Abstraction for remote forges (GitHub).
//!
//! # Architecture
//!
//! The engine consumes only [`PullRequests`]. Production runs use
//! [`ForgePullRequests`], which builds a [`Forge`] per repository from its
//! remote URL via [`create_forge`]. Forge failures never compromise local
//! state.
//!
//! # Modules
//!
//! - `traits`: `Forge` and `PullRequests` traits plus request/response types
//! - [`github`]: GitHub implementation using the REST API
//! - [`mock`]: Mock implementation for deterministic testing
//! - `factory`: Forge selection and creation

mod factory;
pub mod github;
pub mod mock;
mod traits;

pub use factory::{create_forge, ForgePullRequests};
pub use traits::*;
