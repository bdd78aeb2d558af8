//! Open-PR URL resolution.
//!
//! Turns an owner/repo/branch tuple into the HTML URL of an open pull
//! request. Branch-targeted strategies try a cheap GraphQL head-ref
//! lookup first, then the REST `head=owner:branch` filter; the general
//! open-PR listing (sorted by last update, descending) backs the
//! remaining strategies. Resolution itself is never retried, only the
//! individual HTTP requests are.

use std::sync::atomic::Ordering;

use tracing::debug;

use prr_core::{Error, ResolveRequest, Result, SelectStrategy};

use crate::rest::CommentFetcher;
use crate::retry::{execute_with_retry, RetryError};
use crate::urls;
use crate::wire::PrSummary;

impl CommentFetcher {
    /// Resolve the HTML URL of an open PR per the requested strategy.
    pub async fn resolve_pr_url(&self, request: &ResolveRequest) -> Result<String> {
        let host = request
            .host
            .clone()
            .unwrap_or_else(|| self.settings().host.clone());
        let owner = request.owner.trim();
        let repo = request.repo.trim();
        if owner.is_empty() || repo.is_empty() {
            return Err(Error::InvalidArgument(
                "owner and repo are required to resolve a PR".to_string(),
            ));
        }
        let branch = request
            .branch
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty());

        if let Some(branch) = branch {
            if matches!(
                request.strategy,
                SelectStrategy::Branch | SelectStrategy::Error
            ) {
                if let Some(number) = self
                    .graphql_pr_number_for_branch(&host, owner, repo, branch)
                    .await
                {
                    debug!(number, branch, "resolved PR via GraphQL head lookup");
                    return Ok(urls::pr_html_url(&host, owner, repo, number));
                }
                let filtered = self.list_open_prs(&host, owner, repo, Some(branch)).await?;
                if let Some(pr) = filtered.first() {
                    return Ok(summary_url(&host, owner, repo, pr));
                }
                if request.strategy == SelectStrategy::Error {
                    return Err(Error::NotFound(format!(
                        "No open PR found for branch '{branch}'"
                    )));
                }
            }
        } else if matches!(
            request.strategy,
            SelectStrategy::Branch | SelectStrategy::Error
        ) {
            return Err(Error::InvalidArgument(format!(
                "select_strategy '{}' requires a branch",
                request.strategy
            )));
        }

        let open_prs = self.list_open_prs(&host, owner, repo, None).await?;
        if open_prs.is_empty() {
            return Err(Error::NotFound(format!(
                "No open PRs found for {owner}/{repo}"
            )));
        }

        let chosen = match request.strategy {
            SelectStrategy::Branch => {
                let branch = branch.unwrap_or_default();
                open_prs
                    .iter()
                    .find(|pr| head_branch(pr) == Some(branch))
                    .ok_or_else(|| {
                        Error::NotFound(format!("No open PR found for branch '{branch}'"))
                    })?
            }
            SelectStrategy::Latest => &open_prs[0],
            SelectStrategy::First => open_prs
                .iter()
                .min_by_key(|pr| pr.number)
                .unwrap_or(&open_prs[0]),
            // Error strategy either returned or failed above.
            SelectStrategy::Error => unreachable!("error strategy handled by the branch filter"),
        };
        Ok(summary_url(&host, owner, repo, chosen))
    }

    /// List open PRs, optionally filtered to a head branch.
    ///
    /// Unlike the comment fetchers, resolution has no `None` path:
    /// every failure here is a hard error.
    async fn list_open_prs(
        &self,
        host: &str,
        owner: &str,
        repo: &str,
        head_branch: Option<&str>,
    ) -> Result<Vec<PrSummary>> {
        let api_base = urls::api_base_for_host(self.settings(), host);
        let mut url = format!(
            "{}/repos/{}/{}/pulls?state=open&per_page={}",
            api_base,
            urls::encode_segment(owner),
            urls::encode_segment(repo),
            self.settings().per_page,
        );
        match head_branch {
            Some(branch) => {
                url.push_str(&format!(
                    "&head={}:{}",
                    urls::encode_segment(owner),
                    urls::encode_segment(branch)
                ));
            }
            None => url.push_str("&sort=updated&direction=desc"),
        }

        let mut handler = self.status_handler();
        let legacy_auth = handler.legacy_auth_flag();
        let request = || {
            self.authorized(self.client().get(&url), legacy_auth.load(Ordering::SeqCst))
                .send()
        };
        let response = execute_with_retry(
            request,
            self.settings().max_retries,
            self.backoff(),
            Some(&mut handler),
        )
        .await
        .map_err(|err| match err {
            RetryError::Status { status, body } => Error::from_status(status, body),
            RetryError::Transport(e) if e.is_timeout() => Error::Timeout(e.to_string()),
            RetryError::Transport(e) => Error::Http(e.to_string()),
            RetryError::Aborted => {
                Error::Http("request aborted after repeated secondary rate limits".to_string())
            }
        })?;

        response
            .json::<Vec<PrSummary>>()
            .await
            .map_err(|e| Error::Http(format!("failed to decode open PR list: {e}")))
    }
}

fn head_branch(pr: &PrSummary) -> Option<&str> {
    pr.head.as_ref().and_then(|h| h.branch.as_deref())
}

fn summary_url(host: &str, owner: &str, repo: &str, pr: &PrSummary) -> String {
    pr.html_url
        .clone()
        .unwrap_or_else(|| urls::pr_html_url(host, owner, repo, pr.number))
}
