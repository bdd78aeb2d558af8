//! PR URL parsing and endpoint resolution.

use std::sync::OnceLock;

use prr_core::{Error, Result, Settings};
use regex::Regex;
use url::Url;

/// Parsed components of a pull-request HTML URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrLocator {
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

fn pr_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Everything up to pull/<num> must match exactly; a trailing
        // /segment, query string, or fragment is tolerated.
        Regex::new(r"^https://([^/]+)/([^/]+)/([^/]+)/pull/(\d+)(?:[/?#].*)?$")
            .expect("static regex")
    })
}

/// Parse `https://{host}/{owner}/{repo}/pull/{number}`.
pub fn parse_pr_url(pr_url: &str) -> Result<PrLocator> {
    let caps = pr_url_regex().captures(pr_url).ok_or_else(|| {
        Error::InvalidArgument(
            "Invalid PR URL format. Expected format: https://{host}/owner/repo/pull/123"
                .to_string(),
        )
    })?;
    let number = caps[4].parse::<u64>().map_err(|_| {
        Error::InvalidArgument("Invalid PR URL format: pull number out of range".to_string())
    })?;
    Ok(PrLocator {
        host: caps[1].to_string(),
        owner: caps[2].to_string(),
        repo: caps[3].to_string(),
        number,
    })
}

/// Canonical HTML URL for a pull request.
pub fn pr_html_url(host: &str, owner: &str, repo: &str, number: u64) -> String {
    format!("https://{host}/{owner}/{repo}/pull/{number}")
}

/// Whether an endpoint override's host refers to `target_host`.
///
/// `api.github.com` and `github.com` are the same host for dotcom;
/// enterprise hosts must match exactly. Prevents a dotcom override from
/// hijacking requests aimed at a GHES instance (and vice versa).
fn hosts_match(target_host: &str, override_host: &str) -> bool {
    let target = target_host.to_lowercase();
    let candidate = override_host.to_lowercase();
    if target == "github.com" {
        return candidate == "api.github.com" || candidate == "github.com";
    }
    candidate == target
}

fn override_for_host(override_url: Option<&str>, host: &str) -> Option<String> {
    let raw = override_url?;
    let parsed = Url::parse(raw).ok()?;
    let mut netloc = parsed.host_str()?.to_string();
    if let Some(port) = parsed.port() {
        netloc = format!("{netloc}:{port}");
    }
    if hosts_match(host, &netloc) {
        Some(raw.trim_end_matches('/').to_string())
    } else {
        None
    }
}

/// REST API base URL for a GitHub host.
///
/// A configured `GITHUB_API_URL` override wins when it targets the same
/// host; otherwise github.com maps to the public API and enterprise
/// hosts to the `/api/v3` convention.
pub fn api_base_for_host(settings: &Settings, host: &str) -> String {
    if let Some(explicit) = override_for_host(settings.api_url_override.as_deref(), host) {
        return explicit;
    }
    if host.eq_ignore_ascii_case("github.com") {
        return "https://api.github.com".to_string();
    }
    format!("https://{host}/api/v3")
}

/// GraphQL endpoint URL for a GitHub host.
///
/// Precedence: matching `GITHUB_GRAPHQL_URL` override, then inference
/// from `GITHUB_API_URL`, then the public/GHES defaults.
pub fn graphql_url_for_host(settings: &Settings, host: &str) -> String {
    if let Some(explicit) = override_for_host(settings.graphql_url_override.as_deref(), host) {
        return explicit;
    }
    if let Some(rest_base) = settings.api_url_override.as_deref() {
        let base = rest_base.trim_end_matches('/');
        if let Some(root) = base.strip_suffix("/api/v3") {
            return format!("{root}/api/graphql");
        }
        if base.ends_with("/api") {
            return format!("{base}/graphql");
        }
        return format!("{base}/graphql");
    }
    if host.eq_ignore_ascii_case("github.com") {
        return "https://api.github.com/graphql".to_string();
    }
    format!("https://{host}/api/graphql")
}

/// Percent-encode a path segment (owner, repo, branch).
pub fn encode_segment(segment: &str) -> String {
    const SAFE: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.~";
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if SAFE.contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn parses_well_formed_url() {
        let loc = parse_pr_url("https://github.com/octo/repo/pull/42").unwrap();
        assert_eq!(loc.host, "github.com");
        assert_eq!(loc.owner, "octo");
        assert_eq!(loc.repo, "repo");
        assert_eq!(loc.number, 42);
    }

    #[test]
    fn tolerates_trailing_segments() {
        for url in [
            "https://github.com/octo/repo/pull/42/",
            "https://github.com/octo/repo/pull/42/files",
            "https://github.com/octo/repo/pull/42?diff=split",
            "https://github.com/octo/repo/pull/42#discussion_r1",
        ] {
            assert_eq!(parse_pr_url(url).unwrap().number, 42, "failed for {url}");
        }
    }

    #[test]
    fn rejects_malformed_urls() {
        for url in [
            "http://github.com/octo/repo/pull/42",
            "https://github.com/octo/repo/pulls/42",
            "https://github.com/octo/repo/pull/abc",
            "https://github.com/octo/pull/42",
            "not a url",
        ] {
            let err = parse_pr_url(url).unwrap_err();
            assert!(err.is_validation(), "expected validation error for {url}");
        }
    }

    #[test]
    fn round_trips_to_canonical_form() {
        let original = "https://ghe.example.com/team/proj/pull/7";
        let loc = parse_pr_url(original).unwrap();
        assert_eq!(
            pr_html_url(&loc.host, &loc.owner, &loc.repo, loc.number),
            original
        );
    }

    #[test]
    fn api_base_defaults() {
        assert_eq!(
            api_base_for_host(&settings(), "github.com"),
            "https://api.github.com"
        );
        assert_eq!(
            api_base_for_host(&settings(), "ghe.example.com"),
            "https://ghe.example.com/api/v3"
        );
    }

    #[test]
    fn api_override_applies_only_on_matching_host() {
        let mut s = settings();
        s.api_url_override = Some("https://api.github.com".to_string());
        assert_eq!(api_base_for_host(&s, "github.com"), "https://api.github.com");
        // Dotcom override must not leak onto an enterprise host.
        assert_eq!(
            api_base_for_host(&s, "ghe.example.com"),
            "https://ghe.example.com/api/v3"
        );

        s.api_url_override = Some("https://ghe.example.com/api/v3".to_string());
        assert_eq!(
            api_base_for_host(&s, "ghe.example.com"),
            "https://ghe.example.com/api/v3"
        );
    }

    #[test]
    fn graphql_defaults_and_inference() {
        assert_eq!(
            graphql_url_for_host(&settings(), "github.com"),
            "https://api.github.com/graphql"
        );
        assert_eq!(
            graphql_url_for_host(&settings(), "ghe.example.com"),
            "https://ghe.example.com/api/graphql"
        );

        let mut s = settings();
        s.api_url_override = Some("https://ghe.example.com/api/v3".to_string());
        assert_eq!(
            graphql_url_for_host(&s, "ghe.example.com"),
            "https://ghe.example.com/api/graphql"
        );

        s.api_url_override = Some("https://ghe.example.com/api".to_string());
        assert_eq!(
            graphql_url_for_host(&s, "ghe.example.com"),
            "https://ghe.example.com/api/graphql"
        );

        s.api_url_override = Some("https://proxy.example.com".to_string());
        assert_eq!(
            graphql_url_for_host(&s, "proxy.example.com"),
            "https://proxy.example.com/graphql"
        );
    }

    #[test]
    fn graphql_override_wins_when_host_matches() {
        let mut s = settings();
        s.graphql_url_override = Some("https://api.github.com/graphql".to_string());
        assert_eq!(
            graphql_url_for_host(&s, "github.com"),
            "https://api.github.com/graphql"
        );
        // CI often sets a dotcom GraphQL URL; it must be ignored for GHES.
        assert_eq!(
            graphql_url_for_host(&s, "ghe.example.com"),
            "https://ghe.example.com/api/graphql"
        );
    }

    #[test]
    fn encodes_reserved_characters() {
        assert_eq!(encode_segment("octo"), "octo");
        assert_eq!(encode_segment("a/b"), "a%2Fb");
        assert_eq!(encode_segment("feature branch"), "feature%20branch");
    }
}
