//! Wire formats for the GitHub REST and GraphQL APIs.
//!
//! Raw JSON never crosses this boundary: every response shape is
//! deserialized into a typed struct here and normalized into
//! [`ReviewComment`] via `from_rest` / `from_graphql`.

use prr_core::ReviewComment;
use serde::Deserialize;

/// Login used when the underlying user/author is null (deleted account).
pub const UNKNOWN_LOGIN: &str = "unknown";

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RestUser {
    #[serde(default)]
    pub login: Option<String>,
}

/// One element of the REST "list review comments" response.
#[derive(Debug, Clone, Deserialize)]
pub struct RestComment {
    #[serde(default)]
    pub user: Option<RestUser>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub diff_hunk: Option<String>,
}

/// Normalize a REST comment. REST carries no thread resolution state.
pub fn from_rest(comment: RestComment) -> ReviewComment {
    let author_login = comment
        .user
        .and_then(|u| u.login)
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| UNKNOWN_LOGIN.to_string());
    ReviewComment {
        author_login,
        file_path: comment.path.unwrap_or_default(),
        line: comment.line.unwrap_or(0),
        body: comment.body.unwrap_or_default(),
        diff_hunk: comment.diff_hunk.unwrap_or_default(),
        is_resolved: false,
        is_outdated: false,
        resolved_by: None,
    }
}

/// Open-PR summary from the REST pulls listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PrSummary {
    pub number: u64,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub head: Option<PrHead>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrHead {
    #[serde(rename = "ref", default)]
    pub branch: Option<String>,
}

// ---------------------------------------------------------------------------
// GraphQL
// ---------------------------------------------------------------------------

/// Top-level GraphQL response, generic over the `data` payload shape.
///
/// `data` deliberately carries no `#[serde(default)]`: the derive would
/// demand `T: Default`, and a missing field already maps to `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlEnvelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadsData {
    #[serde(default)]
    pub repository: Option<ThreadsRepository>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadsRepository {
    #[serde(default)]
    pub pull_request: Option<GraphQlPullRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlPullRequest {
    pub review_threads: ReviewThreadConnection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewThreadConnection {
    pub page_info: PageInfo,
    #[serde(default)]
    pub nodes: Vec<ReviewThreadNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewThreadNode {
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default)]
    pub is_outdated: bool,
    #[serde(default)]
    pub resolved_by: Option<Actor>,
    #[serde(default)]
    pub comments: CommentConnection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentConnection {
    #[serde(default)]
    pub nodes: Vec<CommentNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    #[serde(default)]
    pub author: Option<Actor>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub diff_hunk: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Actor {
    #[serde(default)]
    pub login: Option<String>,
}

/// Normalize a GraphQL comment node, copying its thread's resolution
/// state onto the comment.
pub fn from_graphql(comment: CommentNode, thread: &ReviewThreadNode) -> ReviewComment {
    let author_login = comment
        .author
        .and_then(|a| a.login)
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| UNKNOWN_LOGIN.to_string());
    let resolved_by = thread
        .resolved_by
        .as_ref()
        .and_then(|a| a.login.clone())
        .filter(|l| !l.is_empty());
    ReviewComment {
        author_login,
        file_path: comment.path.unwrap_or_default(),
        line: comment.line.unwrap_or(0),
        body: comment.body.unwrap_or_default(),
        diff_hunk: comment.diff_hunk.unwrap_or_default(),
        is_resolved: thread.is_resolved,
        is_outdated: thread.is_outdated,
        resolved_by,
    }
}

/// `data` payload for the open-PR-by-branch number lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct PrNumberData {
    #[serde(default)]
    pub repository: Option<PrNumberRepository>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrNumberRepository {
    #[serde(default)]
    pub pull_requests: Option<PrNumberConnection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrNumberConnection {
    #[serde(default)]
    pub nodes: Vec<PrNumberNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrNumberNode {
    #[serde(default)]
    pub number: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_null_user_defaults_to_unknown() {
        let comment: RestComment = serde_json::from_value(serde_json::json!({
            "user": null,
            "path": "src/lib.rs",
            "line": 3,
            "body": "hm",
            "diff_hunk": "@@"
        }))
        .unwrap();
        let normalized = from_rest(comment);
        assert_eq!(normalized.author_login, "unknown");
        assert_eq!(normalized.line, 3);
        assert!(!normalized.is_resolved);
    }

    #[test]
    fn rest_null_line_is_file_level() {
        let comment: RestComment = serde_json::from_value(serde_json::json!({
            "user": {"login": "octocat"},
            "path": "README.md",
            "line": null,
            "body": "file-level"
        }))
        .unwrap();
        let normalized = from_rest(comment);
        assert_eq!(normalized.line, 0);
        assert_eq!(normalized.author_login, "octocat");
        assert_eq!(normalized.diff_hunk, "");
    }

    #[test]
    fn graphql_comment_inherits_thread_state() {
        let thread: ReviewThreadNode = serde_json::from_value(serde_json::json!({
            "isResolved": true,
            "isOutdated": true,
            "resolvedBy": {"login": "maintainer"},
            "comments": {"nodes": []}
        }))
        .unwrap();
        let comment: CommentNode = serde_json::from_value(serde_json::json!({
            "author": {"login": "reviewer"},
            "body": "fix this",
            "path": "src/main.rs",
            "line": 10,
            "diffHunk": "@@ -1 +1 @@"
        }))
        .unwrap();
        let normalized = from_graphql(comment, &thread);
        assert!(normalized.is_resolved);
        assert!(normalized.is_outdated);
        assert_eq!(normalized.resolved_by.as_deref(), Some("maintainer"));
        assert_eq!(normalized.author_login, "reviewer");
    }

    #[test]
    fn envelope_decodes_without_data_or_errors() {
        let envelope: GraphQlEnvelope<ThreadsData> =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(envelope.data.is_none());
        assert!(envelope.errors.is_none());

        let envelope: GraphQlEnvelope<PrNumberData> = serde_json::from_value(serde_json::json!({
            "data": {"repository": null},
            "errors": [{"message": "boom"}]
        }))
        .unwrap();
        assert!(envelope.data.unwrap().repository.is_none());
        assert_eq!(envelope.errors.unwrap().len(), 1);
    }

    #[test]
    fn graphql_null_author_defaults_to_unknown() {
        let thread: ReviewThreadNode = serde_json::from_value(serde_json::json!({
            "isResolved": false,
            "isOutdated": false,
            "resolvedBy": null,
            "comments": {"nodes": []}
        }))
        .unwrap();
        let comment: CommentNode = serde_json::from_value(serde_json::json!({
            "author": null,
            "body": "ghost",
            "path": "a.rs",
            "line": 1
        }))
        .unwrap();
        let normalized = from_graphql(comment, &thread);
        assert_eq!(normalized.author_login, "unknown");
        assert!(normalized.resolved_by.is_none());
    }
}
