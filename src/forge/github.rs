//! forge::github
//!
//! GitHub forge implementation using the REST API.
//!
//! # Authentication
//!
//! A static token (personal access token or app installation token) is sent
//! as a bearer token on every request. The token is read by the caller from
//! the environment variable named in configuration; nothing is stored here.
//!
//! # Rate Limiting
//!
//! GitHub has rate limits. This implementation returns
//! `ForgeError::RateLimited` when they are hit and does not retry.
//!
//! # Example
//!
//! ```ignore
//! use modfleet::forge::github::GitHubForge;
//! use modfleet::forge::{CreatePrRequest, Forge};
//!
//! let forge = GitHubForge::new(token, "acme", "widgets");
//! let pr = forge.create_pr(CreatePrRequest {
//!     head: "bump-deps".to_string(),
//!     base: "main".to_string(),
//!     title: "Update fleet dependencies".to_string(),
//!     body: None,
//!     draft: false,
//! }).await?;
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::traits::{CreatePrRequest, Forge, ForgeError, PrState, PullRequest};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "modfleet";

/// GitHub forge for one repository.
pub struct GitHubForge {
    client: Client,
    token: String,
    /// Repository owner (user or organization)
    owner: String,
    repo: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl GitHubForge {
    /// Create a forge for `owner/repo` on github.com.
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Use a different API base URL (GitHub Enterprise, or a test server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a GitHub forge from a remote URL.
    ///
    /// # Example
    ///
    /// ```
    /// use modfleet::forge::github::GitHubForge;
    ///
    /// let forge = GitHubForge::from_remote_url("git@github.com:owner/repo.git", "token");
    /// assert!(forge.is_some());
    /// assert!(GitHubForge::from_remote_url("https://gitlab.com/owner/repo", "token").is_none());
    /// ```
    pub fn from_remote_url(url: &str, token: impl Into<String>) -> Option<Self> {
        let (owner, repo) = parse_github_url(url)?;
        Some(Self::new(token, owner, repo))
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ForgeError::AuthFailed("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            Err(error_from_response(response, status).await)
        }
    }
}

/// Map a non-success response to a [`ForgeError`].
async fn error_from_response(response: Response, status: StatusCode) -> ForgeError {
    // GitHub Apps report fine-grained permissions, classic tokens report scopes.
    let required = response
        .headers()
        .get("X-Accepted-GitHub-Permissions")
        .or_else(|| response.headers().get("X-Accepted-OAuth-Scopes"))
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let message = match response.json::<GitHubErrorResponse>().await {
        Ok(err) => err.message,
        Err(_) => "Unknown error".to_string(),
    };

    match status {
        StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("Invalid or expired token".into()),
        StatusCode::FORBIDDEN => {
            let mut err_msg = format!("Permission denied: {}", message);
            if let Some(required) = required {
                err_msg.push_str(&format!(" [required: {}]", required));
            }
            ForgeError::AuthFailed(err_msg)
        }
        StatusCode::NOT_FOUND => ForgeError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
        _ if status.is_server_error() => ForgeError::ApiError {
            status: status.as_u16(),
            message: format!("GitHub server error: {}", message),
        },
        _ => ForgeError::ApiError {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        let body = CreatePrBody {
            title: &request.title,
            head: &request.head,
            base: &request.base,
            body: request.body.as_deref(),
            draft: request.draft,
        };

        tracing::debug!(owner = %self.owner, repo = %self.repo, head = %request.head, "creating pull request");
        let response = self
            .client
            .post(self.repo_url("pulls"))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let pr: GitHubPullRequest = self.handle_response(response).await?;
        Ok(pr.into())
    }

    async fn find_pr_by_head(&self, head: &str) -> Result<Option<PullRequest>, ForgeError> {
        // GitHub API requires owner:branch format
        let head_param = if head.contains(':') {
            head.to_string()
        } else {
            format!("{}:{}", self.owner, head)
        };

        let response = self
            .client
            .get(self.repo_url("pulls"))
            .query(&[("head", head_param.as_str()), ("state", "open")])
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let prs: Vec<GitHubPullRequest> = self.handle_response(response).await?;
        Ok(prs.into_iter().next().map(Into::into))
    }
}

/// Request body for creating a PR.
#[derive(Serialize)]
struct CreatePrBody<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    draft: bool,
}

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// GitHub PR response format.
#[derive(Deserialize)]
struct GitHubPullRequest {
    number: u64,
    html_url: String,
    state: String,
    #[serde(default)]
    draft: bool,
    head: GitHubRef,
    base: GitHubRef,
    title: String,
    merged: Option<bool>,
}

/// GitHub ref (head/base) format.
#[derive(Deserialize)]
struct GitHubRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

impl From<GitHubPullRequest> for PullRequest {
    fn from(pr: GitHubPullRequest) -> Self {
        let state = if pr.merged.unwrap_or(false) {
            PrState::Merged
        } else if pr.state == "closed" {
            PrState::Closed
        } else {
            PrState::Open
        };

        PullRequest {
            number: pr.number,
            url: pr.html_url,
            state,
            is_draft: pr.draft,
            head: pr.head.ref_name,
            base: pr.base.ref_name,
            title: pr.title,
        }
    }
}

// --------------------------------------------------------------------------
// URL Parsing
// --------------------------------------------------------------------------

/// Parse a GitHub remote URL to extract owner and repo.
///
/// Supports both SSH and HTTPS formats:
/// - `git@github.com:owner/repo.git`
/// - `https://github.com/owner/repo.git`
/// - `https://github.com/owner/repo`
///
/// # Example
///
/// ```
/// use modfleet::forge::github::parse_github_url;
///
/// let (owner, repo) = parse_github_url("git@github.com:octocat/hello-world.git").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// ```
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("http://github.com/"))?;
    split_owner_repo(rest)
}

/// Split `owner/repo[.git]` into its parts.
pub(crate) fn split_owner_repo(rest: &str) -> Option<(String, String)> {
    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let (owner, repo) = rest.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_github_url {
        use super::*;

        fn pair(owner: &str, repo: &str) -> Option<(String, String)> {
            Some((owner.to_string(), repo.to_string()))
        }

        #[test]
        fn ssh_forms() {
            assert_eq!(
                parse_github_url("git@github.com:octocat/hello-world.git"),
                pair("octocat", "hello-world")
            );
            assert_eq!(
                parse_github_url("git@github.com:octocat/hello-world"),
                pair("octocat", "hello-world")
            );
            assert_eq!(
                parse_github_url("ssh://git@github.com/octocat/hello-world.git"),
                pair("octocat", "hello-world")
            );
        }

        #[test]
        fn https_forms() {
            assert_eq!(
                parse_github_url("https://github.com/octocat/hello-world.git"),
                pair("octocat", "hello-world")
            );
            assert_eq!(
                parse_github_url("http://github.com/octocat/hello-world"),
                pair("octocat", "hello-world")
            );
        }

        #[test]
        fn non_github_url() {
            assert!(parse_github_url("git@gitlab.com:owner/repo.git").is_none());
            assert!(parse_github_url("https://bitbucket.org/owner/repo").is_none());
        }

        #[test]
        fn invalid_format() {
            assert!(parse_github_url("not a url").is_none());
            assert!(parse_github_url("github.com/owner/repo").is_none());
            assert!(parse_github_url("https://github.com/").is_none());
            assert!(parse_github_url("https://github.com/owner").is_none());
            assert!(parse_github_url("https://github.com/owner/repo/extra").is_none());
        }

        #[test]
        fn repo_with_dots() {
            assert_eq!(
                parse_github_url("git@github.com:owner/repo.name.git"),
                pair("owner", "repo.name")
            );
        }
    }

    mod github_forge {
        use super::*;

        #[test]
        fn new_creates_forge() {
            let forge = GitHubForge::new("token", "owner", "repo");
            assert_eq!(forge.name(), "github");
            assert_eq!(forge.owner(), "owner");
            assert_eq!(forge.repo(), "repo");
            assert_eq!(forge.api_base(), DEFAULT_API_BASE);
        }

        #[test]
        fn with_api_base_trims_slash() {
            let forge = GitHubForge::new("token", "owner", "repo")
                .with_api_base("https://github.example.com/api/v3/");
            assert_eq!(forge.api_base(), "https://github.example.com/api/v3");
        }

        #[test]
        fn repo_url_format() {
            let forge = GitHubForge::new("token", "octocat", "hello-world");
            assert_eq!(
                forge.repo_url("pulls"),
                "https://api.github.com/repos/octocat/hello-world/pulls"
            );
        }

        #[test]
        fn debug_redacts_token() {
            let forge = GitHubForge::new("secret_token_abc123", "owner", "repo");
            let debug_output = format!("{:?}", forge);
            assert!(!debug_output.contains("secret_token_abc123"));
            assert!(debug_output.contains("owner"));
        }

        #[test]
        fn bad_token_is_an_error_not_a_panic() {
            let forge = GitHubForge::new("bad\ntoken", "owner", "repo");
            assert!(matches!(forge.headers(), Err(ForgeError::AuthFailed(_))));
        }
    }

    mod github_pull_request {
        use super::*;

        fn gh_pr(state: &str, merged: Option<bool>) -> GitHubPullRequest {
            GitHubPullRequest {
                number: 42,
                html_url: "https://github.com/owner/repo/pull/42".to_string(),
                state: state.to_string(),
                draft: false,
                head: GitHubRef {
                    ref_name: "bump".to_string(),
                },
                base: GitHubRef {
                    ref_name: "main".to_string(),
                },
                title: "Update deps".to_string(),
                merged,
            }
        }

        #[test]
        fn from_open_pr() {
            let pr: PullRequest = gh_pr("open", Some(false)).into();
            assert_eq!(pr.number, 42);
            assert_eq!(pr.state, PrState::Open);
            assert_eq!(pr.head, "bump");
            assert_eq!(pr.base, "main");
        }

        #[test]
        fn from_merged_and_closed_pr() {
            let merged: PullRequest = gh_pr("closed", Some(true)).into();
            assert_eq!(merged.state, PrState::Merged);
            let closed: PullRequest = gh_pr("closed", None).into();
            assert_eq!(closed.state, PrState::Closed);
        }
    }
}
