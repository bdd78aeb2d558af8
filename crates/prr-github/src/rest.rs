//! REST review-comment fetcher.
//!
//! Paginates `GET /repos/{owner}/{repo}/pulls/{number}/comments` following
//! the `Link: rel="next"` header, with auth-scheme fallback and rate-limit
//! handling layered on the retry executor. Transient total failure is
//! reported as `Ok(None)`; only invalid input and exhausted connection
//! errors surface as `Err`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, warn};

use prr_core::{Error, FetchLimits, Result, ReviewComment, Settings};

use crate::backoff::Backoff;
use crate::retry::{execute_with_retry, RetryError, StatusAction, StatusHandler};
use crate::urls::{self, PrLocator};
use crate::wire::{from_rest, RestComment};
use crate::{GITHUB_ACCEPT_HEADER, GITHUB_API_VERSION, GITHUB_USER_AGENT};

/// Fixed sleep applied to secondary (abuse-detection) rate limits.
pub const SECONDARY_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// Consecutive secondary-limit responses tolerated before aborting.
const SECONDARY_RATE_LIMIT_ABORT_AFTER: u32 = 2;

/// Fetches review comments from the GitHub REST and GraphQL APIs.
pub struct CommentFetcher {
    client: Client,
    settings: Settings,
    backoff: Backoff,
    secondary_backoff: Duration,
}

impl CommentFetcher {
    pub fn new(settings: Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs_f64(settings.timeout_secs))
            .connect_timeout(Duration::from_secs_f64(settings.connect_timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            settings,
            backoff: Backoff::new(),
            secondary_backoff: SECONDARY_RATE_LIMIT_BACKOFF,
        })
    }

    /// Replace the secondary rate-limit sleep. Tests shrink it.
    pub fn with_secondary_backoff(mut self, backoff: Duration) -> Self {
        self.secondary_backoff = backoff;
        self
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub(crate) fn status_handler(&self) -> GitHubStatusHandler {
        GitHubStatusHandler::new(self.settings.token.clone(), self.secondary_backoff)
    }

    /// Fetch every review comment on a pull request via REST pagination.
    ///
    /// Returns `Ok(None)` when the fetch could not be completed reliably:
    /// any 5xx observed, a timeout, a secondary rate-limit abort, or an
    /// unrecognized response body.
    pub async fn fetch_rest(
        &self,
        locator: &PrLocator,
        limits: &FetchLimits,
    ) -> Result<Option<Vec<ReviewComment>>> {
        let api_base = urls::api_base_for_host(&self.settings, &locator.host);
        let mut url = format!(
            "{}/repos/{}/{}/pulls/{}/comments?per_page={}",
            api_base,
            urls::encode_segment(&locator.owner),
            urls::encode_segment(&locator.repo),
            locator.number,
            limits.per_page,
        );

        let mut handler = self.status_handler();
        let legacy_auth = handler.legacy_auth_flag();
        let mut comments: Vec<ReviewComment> = Vec::new();

        for page in 0..limits.max_pages {
            let request_url = url.clone();
            let request = || {
                self.authorized(self.client.get(&request_url), legacy_auth.load(Ordering::SeqCst))
                    .send()
            };
            let response = match execute_with_retry(
                request,
                limits.max_retries,
                &self.backoff,
                Some(&mut handler),
            )
            .await
            {
                Ok(response) => response,
                Err(err) => return self.map_fetch_error(err),
            };

            // A 5xx anywhere taints the whole fetch; stop paging right away.
            if handler.saw_server_error() {
                warn!(page, "server error observed, abandoning pagination");
                return Ok(None);
            }

            let next = next_page_url(response.headers());
            let batch = match parse_comment_page(response).await {
                Some(batch) => batch,
                None => return Ok(None),
            };
            debug!(page, count = batch.len(), "fetched comment page");
            comments.extend(batch.into_iter().map(from_rest));

            if comments.len() >= limits.max_comments {
                warn!(
                    total = comments.len(),
                    max_comments = limits.max_comments,
                    "comment cap reached, stopping pagination"
                );
                break;
            }
            match next {
                Some(next_url) => url = next_url,
                None => break,
            }
        }

        Ok(Some(comments))
    }

    /// Attach standard GitHub headers and the current auth scheme.
    pub(crate) fn authorized(&self, request: RequestBuilder, legacy: bool) -> RequestBuilder {
        let request = request
            .header("Accept", GITHUB_ACCEPT_HEADER)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .header("User-Agent", GITHUB_USER_AGENT);
        match self.settings.token.as_deref() {
            Some(token) if legacy => request.header("Authorization", format!("token {token}")),
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    /// Translate a terminal retry outcome into the fetch result.
    pub(crate) fn map_fetch_error(&self, err: RetryError) -> Result<Option<Vec<ReviewComment>>> {
        match err {
            RetryError::Aborted => Ok(None),
            RetryError::Status { status, body: _ } if (500..600).contains(&status) => {
                warn!(status, "server error after exhausting retries");
                Ok(None)
            }
            RetryError::Status { status, body } => Err(Error::from_status(status, body)),
            RetryError::Transport(e) if e.is_timeout() => {
                warn!(error = %e, "request timed out");
                Ok(None)
            }
            RetryError::Transport(e) => Err(Error::Http(e.to_string())),
        }
    }
}

/// Decode one REST page. The body must be a JSON array of objects.
async fn parse_comment_page(response: Response) -> Option<Vec<RestComment>> {
    let value: serde_json::Value = match response.json().await {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "failed to decode comment page body");
            return None;
        }
    };
    if !value.is_array() {
        warn!("unexpected comment page payload, expected a JSON array");
        return None;
    }
    match serde_json::from_value::<Vec<RestComment>>(value) {
        Ok(batch) => Some(batch),
        Err(e) => {
            warn!(error = %e, "malformed comment entries in page");
            None
        }
    }
}

fn link_next_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).expect("static regex")
    })
}

/// Extract the `rel="next"` target from a `Link` response header.
pub(crate) fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get("link")?.to_str().ok()?;
    link.split(',')
        .find_map(|part| link_next_regex().captures(part))
        .map(|caps| caps[1].to_string())
}

/// Response policy shared by the REST and GraphQL paths.
///
/// Handles the Bearer-to-legacy auth fallback, primary rate limits
/// (quota exhaustion), secondary rate limits (abuse detection), and
/// records whether any 5xx was seen so the fetch can refuse to report
/// possibly-partial data.
pub(crate) struct GitHubStatusHandler {
    token: Option<String>,
    legacy_auth: Arc<AtomicBool>,
    auth_fallback_done: bool,
    consecutive_secondary: u32,
    saw_server_error: bool,
    secondary_backoff: Duration,
}

impl GitHubStatusHandler {
    pub(crate) fn new(token: Option<String>, secondary_backoff: Duration) -> Self {
        Self {
            token,
            legacy_auth: Arc::new(AtomicBool::new(false)),
            auth_fallback_done: false,
            consecutive_secondary: 0,
            saw_server_error: false,
            secondary_backoff,
        }
    }

    /// Flag read by the request builder to pick the auth scheme.
    pub(crate) fn legacy_auth_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.legacy_auth)
    }

    pub(crate) fn saw_server_error(&self) -> bool {
        self.saw_server_error
    }
}

#[async_trait]
impl StatusHandler for GitHubStatusHandler {
    async fn on_response(&mut self, response: &Response, _attempt: u32) -> StatusAction {
        let status = response.status().as_u16();

        if status == 401 {
            self.consecutive_secondary = 0;
            if self.token.is_some() && !self.auth_fallback_done {
                warn!("401 with Bearer scheme, retrying with legacy token scheme");
                self.auth_fallback_done = true;
                self.legacy_auth.store(true, Ordering::SeqCst);
                return StatusAction::Retry;
            }
            return StatusAction::Continue;
        }

        if status == 429 || (status == 403 && is_primary_rate_limit(response.headers())) {
            self.consecutive_secondary = 0;
            let delay = primary_rate_limit_delay(response.headers());
            warn!(
                status,
                delay_secs = delay.as_secs(),
                "primary rate limit hit, sleeping until quota reset"
            );
            tokio::time::sleep(delay).await;
            return StatusAction::Retry;
        }

        if status == 403 {
            self.consecutive_secondary += 1;
            if self.consecutive_secondary >= SECONDARY_RATE_LIMIT_ABORT_AFTER {
                warn!("secondary rate limit persisted, aborting fetch");
                return StatusAction::Abort;
            }
            warn!(
                delay_secs = self.secondary_backoff.as_secs(),
                "secondary rate limit hit, backing off"
            );
            tokio::time::sleep(self.secondary_backoff).await;
            return StatusAction::Retry;
        }

        self.consecutive_secondary = 0;
        if (500..600).contains(&status) {
            self.saw_server_error = true;
        }
        StatusAction::Continue
    }
}

/// A 403 is a primary (quota) limit when the remaining-quota header is
/// zero or a `Retry-After` is present; otherwise it is the secondary
/// abuse-detection limit.
fn is_primary_rate_limit(headers: &HeaderMap) -> bool {
    if headers.contains_key("retry-after") {
        return true;
    }
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false)
}

/// How long to sleep on a primary rate limit: `Retry-After` seconds,
/// else time until `X-RateLimit-Reset` (at least 1s), else 60s.
fn primary_rate_limit_delay(headers: &HeaderMap) -> Duration {
    if let Some(secs) = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Duration::from_secs(secs);
    }
    if let Some(reset) = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        return Duration::from_secs(reset.saturating_sub(now).max(1));
    }
    Duration::from_secs(60)
}
