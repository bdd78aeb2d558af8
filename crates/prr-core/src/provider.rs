//! Provider seams between the GitHub engine and its callers.

use async_trait::async_trait;

use crate::types::{FetchOverrides, GitContext, ReviewComment, SelectStrategy};
use crate::Result;

/// Inputs for resolving the URL of an open pull request.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    pub host: Option<String>,
    pub owner: String,
    pub repo: String,
    pub branch: Option<String>,
    pub strategy: SelectStrategy,
}

/// Fetches review comments and resolves open-PR URLs.
///
/// The MCP handlers talk to this trait so tests can substitute a mock
/// for the HTTP-backed implementation.
#[async_trait]
pub trait PrProvider: Send + Sync {
    /// Fetch all review comments for the PR at `pr_url`.
    ///
    /// `Ok(None)` means the fetch failed in a recoverable way (timeouts,
    /// exhausted server errors, rate-limit abort); callers must treat it
    /// as a failure, not an empty comment list. `Err` carries validation
    /// and unrecoverable transport errors.
    async fn fetch_comments(
        &self,
        pr_url: &str,
        overrides: &FetchOverrides,
    ) -> Result<Option<Vec<ReviewComment>>>;

    /// Resolve the HTML URL of an open PR for a repository/branch.
    async fn resolve_open_pr(&self, request: &ResolveRequest) -> Result<String>;
}

/// Supplies the repository context of the current working directory.
pub trait GitContextSource: Send + Sync {
    /// Detect {host, owner, repo, branch} or fail with a descriptive error.
    fn detect(&self) -> Result<GitContext>;
}
