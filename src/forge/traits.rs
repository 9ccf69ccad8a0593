//! forge::traits
//!
//! Forge trait definitions for opening pull requests on a hosting service.
//!
//! # Design
//!
//! Two seams are exposed:
//!
//! - [`Forge`] talks to one hosted repository (owner/name fixed at
//!   construction).
//! - [`PullRequests`] is what the engine consumes. It receives the fleet
//!   [`Repository`] and resolves which hosted repository to talk to.
//!
//! Forge failures never compromise local state: a failed `open` aborts
//! only the remaining steps of that repository.
//!
//! # Example
//!
//! ```ignore
//! use modfleet::forge::{CreatePrRequest, Forge};
//!
//! async fn submit(forge: &dyn Forge) -> Result<(), ForgeError> {
//!     let request = CreatePrRequest {
//!         head: "bump-deps".to_string(),
//!         base: "main".to_string(),
//!         title: "Update fleet dependencies".to_string(),
//!         body: None,
//!         draft: false,
//!     };
//!     let pr = forge.create_pr(request).await?;
//!     println!("Created PR #{}: {}", pr.number, pr.url);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::core::repository::Repository;

/// Errors from forge operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForgeError {
    /// No token is configured.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The repository's remote is not hosted on a supported forge.
    #[error("unsupported remote: {0}")]
    UnsupportedRemote(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Request to create a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePrRequest {
    /// Head branch name (the branch with changes)
    pub head: String,
    /// Base branch name (the branch to merge into)
    pub base: String,
    pub title: String,
    pub body: Option<String>,
    pub draft: bool,
}

/// Pull request information returned from the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    /// Web URL for viewing
    pub url: String,
    pub state: PrState,
    pub is_draft: bool,
    pub head: String,
    pub base: String,
    pub title: String,
}

/// PR state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// One hosted repository.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Short provider name, e.g. `"github"`.
    fn name(&self) -> &'static str;

    /// Create a pull request.
    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError>;

    /// Find the open pull request whose head is `head`, if any.
    async fn find_pr_by_head(&self, head: &str) -> Result<Option<PullRequest>, ForgeError>;
}

/// Pull-request capability consumed by the engine.
#[async_trait]
pub trait PullRequests: Send + Sync {
    /// Open a pull request for `repo`.
    ///
    /// When an open pull request for the same head branch already exists it
    /// is returned instead of creating a second one.
    async fn open(
        &self,
        repo: &Repository,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError>;
}

/// Return the open PR for `request.head`, creating it if needed.
pub async fn open_or_reuse(
    forge: &dyn Forge,
    request: CreatePrRequest,
) -> Result<PullRequest, ForgeError> {
    if let Some(existing) = forge.find_pr_by_head(&request.head).await? {
        tracing::debug!(number = existing.number, head = %request.head, "reusing open pull request");
        return Ok(existing);
    }
    forge.create_pr(request).await
}
