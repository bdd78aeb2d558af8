//! Common types shared across the engine, server, and CLI.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Repository context for the current operation.
///
/// Constructed once per invocation from environment overrides or local
/// git metadata. Host is normalized to lowercase, the other fields are
/// trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitContext {
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl GitContext {
    /// Build a normalized context. Empty fields are rejected.
    pub fn new(
        host: impl AsRef<str>,
        owner: impl AsRef<str>,
        repo: impl AsRef<str>,
        branch: impl AsRef<str>,
    ) -> Result<Self> {
        let host = host.as_ref().trim().to_lowercase();
        let owner = owner.as_ref().trim().to_string();
        let repo = repo.as_ref().trim().to_string();
        let branch = branch.as_ref().trim().to_string();
        if host.is_empty() || owner.is_empty() || repo.is_empty() || branch.is_empty() {
            return Err(Error::Git(
                "Incomplete git context: host, owner, repo, and branch are all required"
                    .to_string(),
            ));
        }
        Ok(Self {
            host,
            owner,
            repo,
            branch,
        })
    }
}

/// A single PR review comment, normalized from either the REST or the
/// GraphQL response shape.
///
/// `author_login` is `"unknown"` when the underlying user/author is null
/// (deleted accounts); it is never empty. `line` is 0 for file-level
/// comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub author_login: String,
    pub file_path: String,
    pub line: u64,
    pub body: String,
    pub diff_hunk: String,
    pub is_resolved: bool,
    pub is_outdated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

/// Strategy for choosing among open PRs when resolving a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectStrategy {
    /// Match the PR whose head ref equals the current branch.
    Branch,
    /// Most recently updated open PR.
    Latest,
    /// Numerically smallest PR number.
    First,
    /// Require an exact branch match; fail without falling back.
    Error,
}

impl Default for SelectStrategy {
    fn default() -> Self {
        Self::Branch
    }
}

impl FromStr for SelectStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "branch" => Ok(Self::Branch),
            "latest" => Ok(Self::Latest),
            "first" => Ok(Self::First),
            "error" => Ok(Self::Error),
            _ => Err(Error::InvalidArgument("Invalid select_strategy".to_string())),
        }
    }
}

impl fmt::Display for SelectStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Branch => "branch",
            Self::Latest => "latest",
            Self::First => "first",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Resolved pagination and retry bounds for a single fetch call.
///
/// Built once from settings plus per-call overrides, then never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub per_page: u32,
    pub max_pages: u32,
    pub max_comments: usize,
    pub max_retries: u32,
}

/// Optional per-call overrides for [`FetchLimits`].
///
/// Overrides take precedence over environment values, which take
/// precedence over defaults. Out-of-range overrides are clamped, not
/// rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOverrides {
    pub per_page: Option<i64>,
    pub max_pages: Option<i64>,
    pub max_comments: Option<i64>,
    pub max_retries: Option<i64>,
}
