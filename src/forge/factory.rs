//! forge::factory
//!
//! Forge selection per fleet repository.
//!
//! Every repository in a fleet has its own hosted counterpart, so the engine
//! is handed a [`ForgePullRequests`] that builds the right [`Forge`] from each
//! repository's remote URL on demand.

use async_trait::async_trait;

use super::github::{parse_github_url, split_owner_repo, GitHubForge, DEFAULT_API_BASE};
use super::traits::{open_or_reuse, CreatePrRequest, Forge, ForgeError, PullRequest, PullRequests};
use crate::core::repository::Repository;

/// Create a forge from a remote URL and token.
///
/// With the default API base only github.com remotes are accepted. With a
/// custom API base (GitHub Enterprise) any `host/owner/repo` remote is
/// accepted and requests go to that base.
///
/// # Errors
///
/// `ForgeError::UnsupportedRemote` if the URL cannot be mapped to an
/// owner and repository.
///
/// # Example
///
/// ```
/// use modfleet::forge::create_forge;
///
/// let forge = create_forge("git@github.com:acme/core.git", "token", "https://api.github.com").unwrap();
/// assert_eq!(forge.name(), "github");
/// assert!(create_forge("git@gitlab.com:acme/core.git", "token", "https://api.github.com").is_err());
/// ```
pub fn create_forge(
    remote_url: &str,
    token: &str,
    api_base: &str,
) -> Result<Box<dyn Forge>, ForgeError> {
    let api_base = api_base.trim_end_matches('/');
    let parsed = if api_base == DEFAULT_API_BASE {
        parse_github_url(remote_url)
    } else {
        crate::core::repository::remote_name_from_url(remote_url)
            .and_then(|name| name.split_once('/').and_then(|(_, rest)| split_owner_repo(rest)))
    };

    let (owner, repo) = parsed.ok_or_else(|| {
        ForgeError::UnsupportedRemote(format!(
            "could not map '{}' to a GitHub repository. \
             Expected format: git@github.com:owner/repo.git or https://github.com/owner/repo.git",
            remote_url
        ))
    })?;

    Ok(Box::new(
        GitHubForge::new(token, owner, repo).with_api_base(api_base),
    ))
}

/// [`PullRequests`] backed by GitHub, one forge per repository.
#[derive(Clone)]
pub struct ForgePullRequests {
    token: Option<String>,
    api_base: String,
}

impl std::fmt::Debug for ForgePullRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForgePullRequests")
            .field("has_token", &self.token.is_some())
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ForgePullRequests {
    /// A missing token only fails when a pull request is actually opened.
    pub fn new(token: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            api_base: api_base.into(),
        }
    }
}

#[async_trait]
impl PullRequests for ForgePullRequests {
    async fn open(
        &self,
        repo: &Repository,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError> {
        let token = self.token.as_deref().ok_or(ForgeError::AuthRequired)?;
        let url = repo.remote_url().ok_or_else(|| {
            ForgeError::UnsupportedRemote(format!("{} has no remote", repo.path().display()))
        })?;
        let forge = create_forge(url, token, &self.api_base)?;
        open_or_reuse(forge.as_ref(), request).await
    }
}
