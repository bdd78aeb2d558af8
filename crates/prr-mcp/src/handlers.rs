//! Tool execution for the MCP server.
//!
//! Two tools are exposed: `fetch_pr_review_comments` and
//! `resolve_open_pr_url`. Argument validation failures surface as
//! protocol-level invalid-params errors; failures while executing a
//! valid call come back as tool results with `isError` set. The one
//! exception is a malformed PR URL, which is reported in-band as a
//! single `{"error": ...}` payload so agents see it alongside normal
//! comment output.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use prr_core::{
    Error, FetchOverrides, GitContextSource, PrProvider, ResolveRequest, SelectStrategy,
};
use prr_render::comments_to_markdown;

use crate::protocol::{JsonRpcError, ToolCallResult, ToolDefinition, ToolResultContent};

const FETCH_TOOL: &str = "fetch_pr_review_comments";
const RESOLVE_TOOL: &str = "resolve_open_pr_url";

/// Executes tool calls against the PR provider and git context source.
pub struct ToolHandler {
    provider: Arc<dyn PrProvider>,
    git: Arc<dyn GitContextSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Markdown,
    Json,
    Both,
}

impl ToolHandler {
    pub fn new(provider: Arc<dyn PrProvider>, git: Arc<dyn GitContextSource>) -> Self {
        Self { provider, git }
    }

    /// Tool definitions for `tools/list`.
    pub fn available_tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: FETCH_TOOL.to_string(),
                description: "Fetches all review comments from a GitHub PR, including \
                              resolution status, outdated flags, and diff context. Returns \
                              formatted Markdown by default (optimized for LLM consumption), \
                              or JSON for programmatic use. Automatically detects PR from \
                              current git branch if URL omitted."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "pr_url": {
                            "type": "string",
                            "description": "The full URL of the GitHub pull request. If omitted, the server will try to resolve the PR for the current git repo and branch."
                        },
                        "output": {
                            "type": "string",
                            "enum": ["markdown", "json", "both"],
                            "description": "Output format. Default 'markdown'. Use 'json' for raw data; 'both' returns json then markdown."
                        },
                        "select_strategy": {
                            "type": "string",
                            "enum": ["branch", "latest", "first", "error"],
                            "description": "Strategy when auto-resolving a PR (default 'branch')."
                        },
                        "owner": {
                            "type": "string",
                            "description": "Override repo owner for PR resolution"
                        },
                        "repo": {
                            "type": "string",
                            "description": "Override repo name for PR resolution"
                        },
                        "branch": {
                            "type": "string",
                            "description": "Override branch name for PR resolution"
                        },
                        "per_page": {
                            "type": "integer",
                            "description": "GitHub API page size (1-100)",
                            "minimum": 1,
                            "maximum": 100
                        },
                        "max_pages": {
                            "type": "integer",
                            "description": "Max number of pages to fetch (server-capped)",
                            "minimum": 1,
                            "maximum": 200
                        },
                        "max_comments": {
                            "type": "integer",
                            "description": "Max total comments to collect (server-capped)",
                            "minimum": 100,
                            "maximum": 100000
                        },
                        "max_retries": {
                            "type": "integer",
                            "description": "Max retries for transient errors (server-capped)",
                            "minimum": 0,
                            "maximum": 10
                        }
                    }
                }),
            },
            ToolDefinition {
                name: RESOLVE_TOOL.to_string(),
                description: "Finds and returns the URL of an open pull request that \
                              matches the current git branch. Uses git metadata to detect \
                              repo owner, name, and branch, then queries GitHub to find \
                              the associated PR. Supports GitHub Enterprise via host \
                              parameter. Optionally override detection with explicit \
                              parameters."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "select_strategy": {
                            "type": "string",
                            "enum": ["branch", "latest", "first", "error"],
                            "description": "Strategy when auto-resolving a PR (default 'branch')."
                        },
                        "owner": {
                            "type": "string",
                            "description": "Override repo owner for PR resolution"
                        },
                        "repo": {
                            "type": "string",
                            "description": "Override repo name for PR resolution"
                        },
                        "branch": {
                            "type": "string",
                            "description": "Override branch name for PR resolution"
                        },
                        "host": {
                            "type": "string",
                            "description": "GitHub host (e.g., 'github.com' or 'github.enterprise.com'). If not provided, detected from git context or defaults to github.com"
                        }
                    }
                }),
            },
        ]
    }

    /// Execute a tool. `Err` means the arguments were invalid and the
    /// request should be rejected at the protocol level.
    pub async fn execute(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolCallResult, JsonRpcError> {
        match name {
            FETCH_TOOL => self.handle_fetch(arguments).await,
            RESOLVE_TOOL => self.handle_resolve(arguments).await,
            other => Ok(ToolCallResult::error(format!("Unknown tool: {other}"))),
        }
    }

    async fn handle_fetch(
        &self,
        arguments: Option<Value>,
    ) -> Result<ToolCallResult, JsonRpcError> {
        let args = arg_map(arguments)?;
        let pr_url = string_arg(&args, "pr_url")?;
        let output = output_arg(&args)?;
        let strategy = strategy_arg(&args)?;
        let owner = string_arg(&args, "owner")?;
        let repo = string_arg(&args, "repo")?;
        let branch = string_arg(&args, "branch")?;
        let overrides = FetchOverrides {
            per_page: int_arg(&args, "per_page", 1, 100)?,
            max_pages: int_arg(&args, "max_pages", 1, 200)?,
            max_comments: int_arg(&args, "max_comments", 100, 100_000)?,
            max_retries: int_arg(&args, "max_retries", 0, 10)?,
        };

        let pr_url = match pr_url {
            Some(url) => url,
            None => match self.resolve_url(None, owner, repo, branch, strategy).await {
                Ok(url) => url,
                Err(e) if e.is_validation() => {
                    return Err(JsonRpcError::invalid_params(&e.to_string()));
                }
                Err(e) => {
                    warn!(error = %e, "PR auto-resolution failed");
                    return Ok(ToolCallResult::error(format!(
                        "Error executing tool {FETCH_TOOL}: {e}"
                    )));
                }
            },
        };

        info!(pr_url, "fetching PR review comments");
        let comments = match self.provider.fetch_comments(&pr_url, &overrides).await {
            Ok(Some(comments)) => comments,
            // Transient total failure degrades to an empty list.
            Ok(None) => Vec::new(),
            Err(Error::InvalidArgument(msg)) => {
                let payload = json!([{ "error": format!("Error in {FETCH_TOOL}: {msg}") }]);
                return Ok(ToolCallResult::text(payload.to_string()));
            }
            Err(e) => {
                warn!(error = %e, "fetch failed");
                return Ok(ToolCallResult::error(format!(
                    "Error executing tool {FETCH_TOOL}: {e}"
                )));
            }
        };

        let mut content = Vec::new();
        if matches!(output, OutputFormat::Json | OutputFormat::Both) {
            let text = serde_json::to_string(&comments)
                .map_err(|e| JsonRpcError::internal_error(&e.to_string()))?;
            content.push(ToolResultContent::Text { text });
        }
        if matches!(output, OutputFormat::Markdown | OutputFormat::Both) {
            content.push(ToolResultContent::Text {
                text: comments_to_markdown(&comments),
            });
        }
        Ok(ToolCallResult {
            content,
            is_error: None,
        })
    }

    async fn handle_resolve(
        &self,
        arguments: Option<Value>,
    ) -> Result<ToolCallResult, JsonRpcError> {
        let args = arg_map(arguments)?;
        let strategy = strategy_arg(&args)?;
        let host = string_arg(&args, "host")?;
        let owner = string_arg(&args, "owner")?;
        let repo = string_arg(&args, "repo")?;
        let branch = string_arg(&args, "branch")?;

        match self.resolve_url(host, owner, repo, branch, strategy).await {
            Ok(url) => Ok(ToolCallResult::text(url)),
            Err(e) if e.is_validation() => Err(JsonRpcError::invalid_params(&e.to_string())),
            Err(e) => {
                warn!(error = %e, "PR resolution failed");
                Ok(ToolCallResult::error(format!(
                    "Error executing tool {RESOLVE_TOOL}: {e}"
                )))
            }
        }
    }

    /// Resolve an open-PR URL, filling missing fields from git context.
    async fn resolve_url(
        &self,
        host: Option<String>,
        owner: Option<String>,
        repo: Option<String>,
        branch: Option<String>,
        strategy: SelectStrategy,
    ) -> prr_core::Result<String> {
        let (host, owner, repo, branch) = match (owner, repo, branch) {
            (Some(owner), Some(repo), branch @ Some(_)) => (host, owner, repo, branch),
            (owner, repo, branch) => {
                let context = self.git.detect()?;
                (
                    host.or(Some(context.host)),
                    owner.unwrap_or(context.owner),
                    repo.unwrap_or(context.repo),
                    branch.or(Some(context.branch)),
                )
            }
        };
        let request = ResolveRequest {
            host,
            owner,
            repo,
            branch,
            strategy,
        };
        self.provider.resolve_open_pr(&request).await
    }
}

/// Tool arguments must be a JSON object (or absent).
fn arg_map(arguments: Option<Value>) -> Result<Map<String, Value>, JsonRpcError> {
    match arguments {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(JsonRpcError::invalid_params("arguments must be an object")),
    }
}

fn string_arg(args: &Map<String, Value>, name: &str) -> Result<Option<String>, JsonRpcError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(JsonRpcError::invalid_params(&format!(
            "Invalid type for {name}: expected string"
        ))),
    }
}

/// Integer argument with inclusive bounds. Booleans and fractional
/// numbers are rejected rather than coerced.
fn int_arg(
    args: &Map<String, Value>,
    name: &str,
    min: i64,
    max: i64,
) -> Result<Option<i64>, JsonRpcError> {
    let value = match args.get(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let number = match value {
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    let number = number.ok_or_else(|| {
        JsonRpcError::invalid_params(&format!("Invalid type for {name}: expected integer"))
    })?;
    if number < min || number > max {
        return Err(JsonRpcError::invalid_params(&format!(
            "Invalid value for {name}: must be between {min} and {max}"
        )));
    }
    Ok(Some(number))
}

fn output_arg(args: &Map<String, Value>) -> Result<OutputFormat, JsonRpcError> {
    match args.get("output") {
        None | Some(Value::Null) => Ok(OutputFormat::Markdown),
        Some(Value::String(s)) => match s.as_str() {
            "markdown" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            "both" => Ok(OutputFormat::Both),
            _ => Err(JsonRpcError::invalid_params(
                "Invalid output: must be 'markdown', 'json', or 'both'",
            )),
        },
        Some(_) => Err(JsonRpcError::invalid_params(
            "Invalid output: must be 'markdown', 'json', or 'both'",
        )),
    }
}

fn strategy_arg(args: &Map<String, Value>) -> Result<SelectStrategy, JsonRpcError> {
    match args.get("select_strategy") {
        None | Some(Value::Null) => Ok(SelectStrategy::default()),
        Some(Value::String(s)) => s
            .parse::<SelectStrategy>()
            .map_err(|e| JsonRpcError::invalid_params(&e.to_string())),
        Some(_) => Err(JsonRpcError::invalid_params("Invalid select_strategy")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use prr_core::{GitContext, Result as CoreResult, ReviewComment};
    use std::sync::Mutex;

    struct MockProvider {
        comments: CoreResult<Option<Vec<ReviewComment>>>,
        resolved: CoreResult<String>,
        fetch_urls: Mutex<Vec<String>>,
        resolve_requests: Mutex<Vec<ResolveRequest>>,
    }

    impl MockProvider {
        fn with_comments(comments: Vec<ReviewComment>) -> Self {
            Self {
                comments: Ok(Some(comments)),
                resolved: Ok("https://github.com/octo/repo/pull/1".to_string()),
                fetch_urls: Mutex::new(Vec::new()),
                resolve_requests: Mutex::new(Vec::new()),
            }
        }

        fn with_fetch_outcome(outcome: CoreResult<Option<Vec<ReviewComment>>>) -> Self {
            Self {
                comments: outcome,
                resolved: Ok("https://github.com/octo/repo/pull/1".to_string()),
                fetch_urls: Mutex::new(Vec::new()),
                resolve_requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PrProvider for MockProvider {
        async fn fetch_comments(
            &self,
            pr_url: &str,
            _overrides: &FetchOverrides,
        ) -> CoreResult<Option<Vec<ReviewComment>>> {
            self.fetch_urls.lock().unwrap().push(pr_url.to_string());
            clone_outcome(&self.comments)
        }

        async fn resolve_open_pr(&self, request: &ResolveRequest) -> CoreResult<String> {
            self.resolve_requests.lock().unwrap().push(request.clone());
            match &self.resolved {
                Ok(url) => Ok(url.clone()),
                Err(e) => Err(Error::NotFound(e.to_string())),
            }
        }
    }

    fn clone_outcome(
        outcome: &CoreResult<Option<Vec<ReviewComment>>>,
    ) -> CoreResult<Option<Vec<ReviewComment>>> {
        match outcome {
            Ok(value) => Ok(value.clone()),
            Err(Error::InvalidArgument(msg)) => Err(Error::InvalidArgument(msg.clone())),
            Err(e) => Err(Error::Http(e.to_string())),
        }
    }

    struct MockGit(CoreResult<GitContext>);

    impl GitContextSource for MockGit {
        fn detect(&self) -> CoreResult<GitContext> {
            match &self.0 {
                Ok(ctx) => Ok(ctx.clone()),
                Err(e) => Err(Error::Git(e.to_string())),
            }
        }
    }

    fn git_ok() -> Arc<MockGit> {
        Arc::new(MockGit(GitContext::new(
            "github.com",
            "octo",
            "repo",
            "feature",
        )))
    }

    fn comment() -> ReviewComment {
        ReviewComment {
            author_login: "alice".to_string(),
            file_path: "src/lib.rs".to_string(),
            line: 1,
            body: "nit".to_string(),
            diff_hunk: "@@".to_string(),
            is_resolved: false,
            is_outdated: false,
            resolved_by: None,
        }
    }

    fn handler(provider: MockProvider) -> (Arc<MockProvider>, ToolHandler) {
        let provider = Arc::new(provider);
        let handler = ToolHandler::new(provider.clone(), git_ok());
        (provider, handler)
    }

    #[tokio::test]
    async fn fetch_renders_markdown_by_default() {
        let (_, handler) = handler(MockProvider::with_comments(vec![comment()]));
        let result = handler
            .execute(
                FETCH_TOOL,
                Some(json!({"pr_url": "https://github.com/octo/repo/pull/7"})),
            )
            .await
            .unwrap();
        assert!(result.is_error.is_none());
        assert_eq!(result.content.len(), 1);
        assert!(result.first_text().contains("# Pull Request Review Comments"));
        assert!(result.first_text().contains("alice"));
    }

    #[tokio::test]
    async fn fetch_output_both_returns_json_then_markdown() {
        let (_, handler) = handler(MockProvider::with_comments(vec![comment()]));
        let result = handler
            .execute(
                FETCH_TOOL,
                Some(json!({
                    "pr_url": "https://github.com/octo/repo/pull/7",
                    "output": "both"
                })),
            )
            .await
            .unwrap();
        assert_eq!(result.content.len(), 2);
        let ToolResultContent::Text { text: json_text } = &result.content[0];
        let parsed: Vec<ReviewComment> = serde_json::from_str(json_text).unwrap();
        assert_eq!(parsed.len(), 1);
        let ToolResultContent::Text { text: md } = &result.content[1];
        assert!(md.starts_with("# Pull Request Review Comments"));
    }

    #[tokio::test]
    async fn fetch_transient_failure_becomes_empty_list() {
        let (_, handler) = handler(MockProvider::with_fetch_outcome(Ok(None)));
        let result = handler
            .execute(
                FETCH_TOOL,
                Some(json!({
                    "pr_url": "https://github.com/octo/repo/pull/7",
                    "output": "json"
                })),
            )
            .await
            .unwrap();
        assert!(result.is_error.is_none());
        assert_eq!(result.first_text(), "[]");
    }

    #[tokio::test]
    async fn fetch_invalid_url_is_reported_in_band() {
        let (_, handler) = handler(MockProvider::with_fetch_outcome(Err(
            Error::InvalidArgument("Invalid PR URL format".to_string()),
        )));
        let result = handler
            .execute(FETCH_TOOL, Some(json!({"pr_url": "not-a-url"})))
            .await
            .unwrap();
        assert!(result.is_error.is_none());
        let payload: Vec<serde_json::Value> =
            serde_json::from_str(result.first_text()).unwrap();
        assert!(payload[0]["error"]
            .as_str()
            .unwrap()
            .contains("Invalid PR URL format"));
    }

    #[tokio::test]
    async fn fetch_http_failure_is_a_tool_error() {
        let (_, handler) = handler(MockProvider::with_fetch_outcome(Err(Error::Http(
            "connection reset".to_string(),
        ))));
        let result = handler
            .execute(
                FETCH_TOOL,
                Some(json!({"pr_url": "https://github.com/octo/repo/pull/7"})),
            )
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(result.first_text().contains("connection reset"));
    }

    #[tokio::test]
    async fn fetch_resolves_url_when_absent() {
        let (provider, handler) = handler(MockProvider::with_comments(vec![]));
        let result = handler.execute(FETCH_TOOL, Some(json!({}))).await.unwrap();
        assert!(result.is_error.is_none());
        assert_eq!(
            provider.fetch_urls.lock().unwrap().as_slice(),
            ["https://github.com/octo/repo/pull/1"]
        );
        let requests = provider.resolve_requests.lock().unwrap();
        assert_eq!(requests[0].owner, "octo");
        assert_eq!(requests[0].branch.as_deref(), Some("feature"));
    }

    #[tokio::test]
    async fn bool_where_integer_expected_is_invalid_params() {
        let (_, handler) = handler(MockProvider::with_comments(vec![]));
        let err = handler
            .execute(
                FETCH_TOOL,
                Some(json!({
                    "pr_url": "https://github.com/octo/repo/pull/7",
                    "per_page": true
                })),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_PARAMS);
        assert!(err.message.contains("per_page"));
    }

    #[tokio::test]
    async fn out_of_range_integer_is_invalid_params() {
        let (_, handler) = handler(MockProvider::with_comments(vec![]));
        let err = handler
            .execute(
                FETCH_TOOL,
                Some(json!({
                    "pr_url": "https://github.com/octo/repo/pull/7",
                    "max_retries": 11
                })),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_PARAMS);
        assert!(err.message.contains("between 0 and 10"));
    }

    #[tokio::test]
    async fn bad_output_literal_is_invalid_params() {
        let (_, handler) = handler(MockProvider::with_comments(vec![]));
        let err = handler
            .execute(
                FETCH_TOOL,
                Some(json!({
                    "pr_url": "https://github.com/octo/repo/pull/7",
                    "output": "yaml"
                })),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_PARAMS);
        assert!(err.message.contains("'markdown', 'json', or 'both'"));
    }

    #[tokio::test]
    async fn bad_strategy_literal_is_invalid_params() {
        let (_, handler) = handler(MockProvider::with_comments(vec![]));
        let err = handler
            .execute(RESOLVE_TOOL, Some(json!({"select_strategy": "newest"})))
            .await
            .unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_PARAMS);
        assert!(err.message.contains("Invalid select_strategy"));
    }

    #[tokio::test]
    async fn resolve_returns_url_text() {
        let (provider, handler) = handler(MockProvider::with_comments(vec![]));
        let result = handler
            .execute(RESOLVE_TOOL, Some(json!({"select_strategy": "latest"})))
            .await
            .unwrap();
        assert_eq!(result.first_text(), "https://github.com/octo/repo/pull/1");
        let requests = provider.resolve_requests.lock().unwrap();
        assert_eq!(requests[0].strategy, SelectStrategy::Latest);
    }

    #[tokio::test]
    async fn resolve_explicit_args_skip_git_detection() {
        let provider = Arc::new(MockProvider::with_comments(vec![]));
        let failing_git = Arc::new(MockGit(Err(Error::Git("no repo".to_string()))));
        let handler = ToolHandler::new(provider.clone(), failing_git);

        let result = handler
            .execute(
                RESOLVE_TOOL,
                Some(json!({"owner": "octo", "repo": "repo", "branch": "main"})),
            )
            .await
            .unwrap();
        assert!(result.is_error.is_none());
    }

    #[tokio::test]
    async fn resolve_git_failure_is_a_tool_error() {
        let provider = Arc::new(MockProvider::with_comments(vec![]));
        let failing_git = Arc::new(MockGit(Err(Error::Git("not a repository".to_string()))));
        let handler = ToolHandler::new(provider, failing_git);

        let result = handler.execute(RESOLVE_TOOL, None).await.unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(result.first_text().contains("not a repository"));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_tool_error() {
        let (_, handler) = handler(MockProvider::with_comments(vec![]));
        let result = handler.execute("no_such_tool", None).await.unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
