//! GraphQL review-thread fetcher.
//!
//! The GraphQL API exposes thread resolution state (`isResolved`,
//! `isOutdated`, `resolvedBy`) that REST does not, so this is the
//! primary fetch path. Threads are paged by cursor and their comments
//! flattened, each comment inheriting its thread's resolution state.
//! GraphQL always requires a token; without one the fetch reports
//! failure rather than degrading silently.

use std::sync::atomic::Ordering;

use serde_json::json;
use tracing::{debug, warn};

use prr_core::{FetchLimits, Result, ReviewComment};

use crate::rest::CommentFetcher;
use crate::retry::execute_with_retry;
use crate::urls::{self, PrLocator};
use crate::wire::{from_graphql, GraphQlEnvelope, PrNumberData, ThreadsData};

const REVIEW_THREADS_QUERY: &str = r#"
query($owner: String!, $name: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      reviewThreads(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes {
          isResolved
          isOutdated
          resolvedBy { login }
          comments(first: 100) {
            nodes { author { login } body path line diffHunk }
          }
        }
      }
    }
  }
}
"#;

const PR_NUMBER_QUERY: &str = r#"
query($owner: String!, $name: String!, $branch: String!) {
  repository(owner: $owner, name: $name) {
    pullRequests(headRefName: $branch, states: OPEN, first: 1) {
      nodes { number }
    }
  }
}
"#;

impl CommentFetcher {
    /// Fetch every review comment on a pull request via GraphQL threads.
    ///
    /// Returns `Ok(None)` on any condition that prevents a reliable
    /// result: missing token, GraphQL-level errors, missing PR, server
    /// errors, timeouts, or a secondary rate-limit abort.
    pub async fn fetch_graphql(
        &self,
        locator: &PrLocator,
        limits: &FetchLimits,
    ) -> Result<Option<Vec<ReviewComment>>> {
        if self.settings().token.is_none() {
            warn!("GraphQL fetch requires a token, none configured");
            return Ok(None);
        }
        let endpoint = urls::graphql_url_for_host(self.settings(), &locator.host);

        let mut handler = self.status_handler();
        let legacy_auth = handler.legacy_auth_flag();
        let mut comments: Vec<ReviewComment> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let payload = json!({
                "query": REVIEW_THREADS_QUERY,
                "variables": {
                    "owner": locator.owner,
                    "name": locator.repo,
                    "number": locator.number,
                    "cursor": cursor,
                },
            });
            let request = || {
                self.authorized(
                    self.client().post(&endpoint).json(&payload),
                    legacy_auth.load(Ordering::SeqCst),
                )
                .send()
            };
            let response = match execute_with_retry(
                request,
                limits.max_retries,
                self.backoff(),
                Some(&mut handler),
            )
            .await
            {
                Ok(response) => response,
                Err(err) => return self.map_fetch_error(err),
            };

            // A 5xx anywhere taints the whole fetch; stop paging right away.
            if handler.saw_server_error() {
                warn!("server error observed, abandoning thread pagination");
                return Ok(None);
            }

            let envelope: GraphQlEnvelope<ThreadsData> = match response.json().await {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(error = %e, "failed to decode GraphQL response");
                    return Ok(None);
                }
            };
            if envelope.errors.as_ref().is_some_and(|errors| !errors.is_empty()) {
                warn!(errors = ?envelope.errors, "GraphQL query returned errors");
                return Ok(None);
            }
            let threads = match envelope
                .data
                .and_then(|d| d.repository)
                .and_then(|r| r.pull_request)
            {
                Some(pr) => pr.review_threads,
                None => {
                    warn!("pull request missing from GraphQL response");
                    return Ok(None);
                }
            };

            debug!(threads = threads.nodes.len(), "fetched review thread page");
            for mut thread in threads.nodes {
                let nodes = std::mem::take(&mut thread.comments.nodes);
                for comment in nodes {
                    comments.push(from_graphql(comment, &thread));
                }
            }

            if comments.len() >= limits.max_comments {
                warn!(
                    total = comments.len(),
                    max_comments = limits.max_comments,
                    "comment cap reached, stopping thread pagination"
                );
                break;
            }
            if !threads.page_info.has_next_page {
                break;
            }
            cursor = match threads.page_info.end_cursor {
                Some(cursor) => Some(cursor),
                None => break,
            };
        }

        Ok(Some(comments))
    }

    /// Best-effort lookup of the open PR whose head is `branch`.
    ///
    /// Used by the resolver before it falls back to the REST listing;
    /// every failure mode is reported as `None`.
    pub(crate) async fn graphql_pr_number_for_branch(
        &self,
        host: &str,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Option<u64> {
        self.settings().token.as_ref()?;
        let endpoint = urls::graphql_url_for_host(self.settings(), host);
        let payload = json!({
            "query": PR_NUMBER_QUERY,
            "variables": { "owner": owner, "name": repo, "branch": branch },
        });

        let mut handler = self.status_handler();
        let legacy_auth = handler.legacy_auth_flag();
        let request = || {
            self.authorized(
                self.client().post(&endpoint).json(&payload),
                legacy_auth.load(Ordering::SeqCst),
            )
            .send()
        };
        let response = match execute_with_retry(
            request,
            self.settings().max_retries,
            self.backoff(),
            Some(&mut handler),
        )
        .await
        {
            Ok(response) => response,
            Err(err) => {
                debug!(error = ?err, "GraphQL PR-number lookup failed");
                return None;
            }
        };

        let envelope: GraphQlEnvelope<PrNumberData> = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "failed to decode PR-number lookup response");
                return None;
            }
        };
        if envelope.errors.as_ref().is_some_and(|errors| !errors.is_empty()) {
            debug!(errors = ?envelope.errors, "PR-number lookup returned errors");
            return None;
        }
        envelope
            .data?
            .repository?
            .pull_requests?
            .nodes
            .first()?
            .number
    }
}
