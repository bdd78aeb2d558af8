//! GitHub review-comment engine for prr.
//!
//! This crate holds the hard parts of the system: the REST and GraphQL
//! comment fetchers with pagination, authentication fallback, primary and
//! secondary rate-limit handling, transient-error retries with exponential
//! backoff, and the open-PR URL resolver.

pub mod backoff;
pub mod graphql;
pub mod provider;
pub mod resolver;
pub mod rest;
pub mod retry;
pub mod urls;
pub mod wire;

pub use provider::GitHubProvider;
pub use rest::CommentFetcher;
pub use urls::{parse_pr_url, PrLocator};

/// Accept header sent on every GitHub API request.
pub const GITHUB_ACCEPT_HEADER: &str = "application/vnd.github+json";

/// Pinned REST API version.
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// User agent for all outbound requests.
pub const GITHUB_USER_AGENT: &str = concat!("prr/", env!("CARGO_PKG_VERSION"));
