//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock stores PRs in memory and allows configuring failure scenarios.
//! It implements both [`Forge`] and [`PullRequests`]; as a `PullRequests` it
//! behaves like a single forge shared by every repository, keyed by the
//! repository's remote name.
//!
//! # Example
//!
//! ```
//! use modfleet::forge::mock::MockForge;
//! use modfleet::forge::{CreatePrRequest, Forge, PrState};
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new();
//!
//! let pr = forge.create_pr(CreatePrRequest {
//!     head: "bump".to_string(),
//!     base: "main".to_string(),
//!     title: "Update deps".to_string(),
//!     body: None,
//!     draft: false,
//! }).await.unwrap();
//!
//! assert_eq!(pr.number, 1);
//! assert_eq!(pr.state, PrState::Open);
//! assert!(forge.find_pr_by_head("bump").await.unwrap().is_some());
//! # });
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::traits::{CreatePrRequest, Forge, ForgeError, PrState, PullRequest, PullRequests};
use crate::core::repository::Repository;

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone, Default)]
pub struct MockForge {
    inner: Arc<Mutex<MockForgeInner>>,
}

#[derive(Debug, Default)]
struct MockForgeInner {
    /// Stored PRs with the remote name they were opened for.
    prs: Vec<(Option<String>, PullRequest)>,
    fail_on: Option<FailOn>,
    /// Repositories whose `open` fails.
    failing_repos: HashSet<PathBuf>,
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    CreatePr(ForgeError),
    FindPrByHead(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    CreatePr {
        head: String,
        base: String,
        title: String,
        draft: bool,
    },
    FindPrByHead {
        head: String,
    },
    Open {
        repo: PathBuf,
        head: String,
    },
}

impl MockForge {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockForgeInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// ```
    /// use modfleet::forge::mock::{FailOn, MockForge};
    /// use modfleet::forge::ForgeError;
    ///
    /// let forge = MockForge::new().fail_on(FailOn::CreatePr(ForgeError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on = Some(fail_on);
        self
    }

    /// Make [`PullRequests::open`] fail for the repository at `path`.
    pub fn fail_for_repo(&self, path: impl Into<PathBuf>) {
        self.lock().failing_repos.insert(path.into());
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// All PRs created so far.
    pub fn all_prs(&self) -> Vec<PullRequest> {
        self.lock().prs.iter().map(|(_, pr)| pr.clone()).collect()
    }

    pub fn pr_count(&self) -> usize {
        self.lock().prs.len()
    }

    fn record(&self, op: MockOperation) {
        self.lock().operations.push(op);
    }

    fn check_fail(&self, create: bool) -> Result<(), ForgeError> {
        match &self.lock().fail_on {
            Some(FailOn::CreatePr(e)) if create => Err(e.clone()),
            Some(FailOn::FindPrByHead(e)) if !create => Err(e.clone()),
            _ => Ok(()),
        }
    }

    fn find(&self, scope: Option<&str>, head: &str) -> Result<Option<PullRequest>, ForgeError> {
        self.record(MockOperation::FindPrByHead {
            head: head.to_string(),
        });
        self.check_fail(false)?;
        Ok(self
            .lock()
            .prs
            .iter()
            .find(|(s, pr)| s.as_deref() == scope && pr.head == head && pr.state == PrState::Open)
            .map(|(_, pr)| pr.clone()))
    }

    fn create(
        &self,
        scope: Option<String>,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError> {
        self.record(MockOperation::CreatePr {
            head: request.head.clone(),
            base: request.base.clone(),
            title: request.title.clone(),
            draft: request.draft,
        });
        self.check_fail(true)?;

        let mut inner = self.lock();
        let number = inner.prs.len() as u64 + 1;
        let pr = PullRequest {
            number,
            url: format!("https://github.com/mock/repo/pull/{}", number),
            state: PrState::Open,
            is_draft: request.draft,
            head: request.head,
            base: request.base,
            title: request.title,
        };
        inner.prs.push((scope, pr.clone()));
        Ok(pr)
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        self.create(None, request)
    }

    async fn find_pr_by_head(&self, head: &str) -> Result<Option<PullRequest>, ForgeError> {
        self.find(None, head)
    }
}

#[async_trait]
impl PullRequests for MockForge {
    async fn open(
        &self,
        repo: &Repository,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError> {
        self.record(MockOperation::Open {
            repo: repo.path().to_path_buf(),
            head: request.head.clone(),
        });
        if self.lock().failing_repos.contains(repo.path()) {
            return Err(ForgeError::ApiError {
                status: 422,
                message: format!("injected failure for {}", repo.remote_name()),
            });
        }

        let scope = repo.remote_name().to_string();
        if let Some(existing) = self.find(Some(&scope), &request.head)? {
            return Ok(existing);
        }
        self.create(Some(scope), request)
    }
}
