//! Server settings loaded from the environment.
//!
//! All numeric values are clamped into their documented bounds instead of
//! being rejected, and invalid values fall back to the default. The engine
//! never reads the environment directly; it receives an immutable
//! [`Settings`] value so tests can inject arbitrary configurations.
//!
//! Environment variables:
//!
//! - `GITHUB_TOKEN`: personal access token (optional for REST, required
//!   for GraphQL)
//! - `GH_HOST`: GitHub hostname (default `github.com`)
//! - `GITHUB_API_URL` / `GITHUB_GRAPHQL_URL`: endpoint overrides, HTTPS
//!   only, applied when their host matches the target host
//! - `HTTP_PER_PAGE`: page size (default 100, range 1-100)
//! - `PR_FETCH_MAX_PAGES`: page cap (default 50, range 1-200)
//! - `PR_FETCH_MAX_COMMENTS`: comment cap (default 2000, range 100-100000)
//! - `HTTP_MAX_RETRIES`: retry budget (default 3, range 0-10)
//! - `HTTP_TIMEOUT`: total timeout seconds (default 30.0, range 1.0-300.0)
//! - `HTTP_CONNECT_TIMEOUT`: connect timeout seconds (default 10.0,
//!   range 1.0-60.0)

use std::sync::OnceLock;

use tracing::warn;

use crate::types::{FetchLimits, FetchOverrides};

pub const PER_PAGE_BOUNDS: (i64, i64) = (1, 100);
pub const MAX_PAGES_BOUNDS: (i64, i64) = (1, 200);
pub const MAX_COMMENTS_BOUNDS: (i64, i64) = (100, 100_000);
pub const MAX_RETRIES_BOUNDS: (i64, i64) = (0, 10);
pub const TIMEOUT_BOUNDS: (f64, f64) = (1.0, 300.0);
pub const CONNECT_TIMEOUT_BOUNDS: (f64, f64) = (1.0, 60.0);

static GLOBAL: OnceLock<Settings> = OnceLock::new();

/// Immutable server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub token: Option<String>,
    pub host: String,
    pub api_url_override: Option<String>,
    pub graphql_url_override: Option<String>,
    pub per_page: u32,
    pub max_pages: u32,
    pub max_comments: usize,
    pub max_retries: u32,
    pub timeout_secs: f64,
    pub connect_timeout_secs: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: None,
            host: "github.com".to_string(),
            api_url_override: None,
            graphql_url_override: None,
            per_page: 100,
            max_pages: 50,
            max_comments: 2000,
            max_retries: 3,
            timeout_secs: 30.0,
            connect_timeout_secs: 10.0,
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings from an arbitrary variable source.
    ///
    /// The indirection keeps tests free of process-wide env mutation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let token = lookup("GITHUB_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let host = lookup("GH_HOST")
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "github.com".to_string());

        Self {
            token,
            host,
            api_url_override: url_var(&lookup, "GITHUB_API_URL"),
            graphql_url_override: url_var(&lookup, "GITHUB_GRAPHQL_URL"),
            per_page: int_var(&lookup, "HTTP_PER_PAGE", 100, PER_PAGE_BOUNDS) as u32,
            max_pages: int_var(&lookup, "PR_FETCH_MAX_PAGES", 50, MAX_PAGES_BOUNDS) as u32,
            max_comments: int_var(&lookup, "PR_FETCH_MAX_COMMENTS", 2000, MAX_COMMENTS_BOUNDS)
                as usize,
            max_retries: int_var(&lookup, "HTTP_MAX_RETRIES", 3, MAX_RETRIES_BOUNDS) as u32,
            timeout_secs: float_var(&lookup, "HTTP_TIMEOUT", 30.0, TIMEOUT_BOUNDS),
            connect_timeout_secs: float_var(
                &lookup,
                "HTTP_CONNECT_TIMEOUT",
                10.0,
                CONNECT_TIMEOUT_BOUNDS,
            ),
        }
    }

    /// Process-wide memoized settings, read-only after first construction.
    pub fn global() -> &'static Settings {
        GLOBAL.get_or_init(Settings::from_env)
    }

    /// Resolve per-call limits: override > settings > default, all clamped.
    pub fn limits(&self, overrides: &FetchOverrides) -> FetchLimits {
        FetchLimits {
            per_page: apply_override(overrides.per_page, self.per_page as i64, PER_PAGE_BOUNDS)
                as u32,
            max_pages: apply_override(overrides.max_pages, self.max_pages as i64, MAX_PAGES_BOUNDS)
                as u32,
            max_comments: apply_override(
                overrides.max_comments,
                self.max_comments as i64,
                MAX_COMMENTS_BOUNDS,
            ) as usize,
            max_retries: apply_override(
                overrides.max_retries,
                self.max_retries as i64,
                MAX_RETRIES_BOUNDS,
            ) as u32,
        }
    }
}

/// Clamp `value` into `bounds`.
pub fn clamp(value: i64, bounds: (i64, i64)) -> i64 {
    value.clamp(bounds.0, bounds.1)
}

fn apply_override(override_v: Option<i64>, configured: i64, bounds: (i64, i64)) -> i64 {
    match override_v {
        Some(v) => clamp(v, bounds),
        None => clamp(configured, bounds),
    }
}

fn int_var(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: i64, bounds: (i64, i64)) -> i64 {
    match lookup(name) {
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(v) => clamp(v, bounds),
            Err(_) => {
                warn!(name, value = %raw, "non-integer env value, using default");
                default
            }
        },
        None => clamp(default, bounds),
    }
}

fn float_var(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: f64,
    bounds: (f64, f64),
) -> f64 {
    match lookup(name) {
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v.clamp(bounds.0, bounds.1),
            _ => {
                warn!(name, value = %raw, "non-numeric env value, using default");
                default
            }
        },
        None => default.clamp(bounds.0, bounds.1),
    }
}

fn url_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    let raw = lookup(name)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if !trimmed.starts_with("https://") {
        warn!(name, value = %trimmed, "ignoring non-HTTPS endpoint override");
        return None;
    }
    Some(trimmed.trim_end_matches('/').to_string())
}
