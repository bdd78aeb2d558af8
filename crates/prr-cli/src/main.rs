//! prr CLI - PR review comments over MCP or directly from the terminal.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use prr_core::{GitContextSource, ResolveRequest, SelectStrategy, Settings};
use prr_git::GitDetector;
use prr_github::{CommentFetcher, GitHubProvider};
use prr_mcp::McpServer;
use prr_render::comments_to_markdown;

#[derive(Parser)]
#[command(name = "prr")]
#[command(author, version, about = "GitHub PR review comments server", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server on stdio (default)
    Serve,

    /// Fetch review comments for a PR and print them
    Fetch {
        /// Full URL of the pull request
        #[arg(long)]
        pr_url: String,

        /// Output format: markdown, json, or both
        #[arg(long, default_value = "markdown")]
        output: String,
    },

    /// Resolve the open PR URL for a branch
    Resolve {
        /// Selection strategy: branch, latest, first, or error
        #[arg(long, default_value = "branch")]
        strategy: String,

        /// Repository owner (detected from git if omitted)
        #[arg(long)]
        owner: Option<String>,

        /// Repository name (detected from git if omitted)
        #[arg(long)]
        repo: Option<String>,

        /// Branch name (detected from git if omitted)
        #[arg(long)]
        branch: Option<String>,

        /// GitHub host, e.g. github.com or a GHE domain
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // stdout carries the MCP transport, so logs go to stderr.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        None | Some(Commands::Serve) => serve().await,
        Some(Commands::Fetch { pr_url, output }) => fetch(&pr_url, &output).await,
        Some(Commands::Resolve {
            strategy,
            owner,
            repo,
            branch,
            host,
        }) => resolve(&strategy, owner, repo, branch, host).await,
    }
}

async fn serve() -> anyhow::Result<()> {
    tracing::info!("prr {} serving MCP on stdio", env!("CARGO_PKG_VERSION"));

    let settings = Settings::global().clone();
    let provider = GitHubProvider::new(settings).context("failed to build GitHub client")?;
    let git = GitDetector::new();

    let mut server = McpServer::new(Arc::new(provider), Arc::new(git));
    server.run().await?;
    Ok(())
}

async fn fetch(pr_url: &str, output: &str) -> anyhow::Result<()> {
    if !matches!(output, "markdown" | "json" | "both") {
        anyhow::bail!("invalid output '{output}': must be 'markdown', 'json', or 'both'");
    }

    let settings = Settings::global().clone();
    let limits = settings.limits(&Default::default());
    let fetcher = CommentFetcher::new(settings).context("failed to build GitHub client")?;
    let locator = prr_github::parse_pr_url(pr_url)?;

    let comments = fetcher
        .fetch_rest(&locator, &limits)
        .await?
        .unwrap_or_default();

    if matches!(output, "json" | "both") {
        println!("{}", serde_json::to_string_pretty(&comments)?);
    }
    if matches!(output, "markdown" | "both") {
        println!("{}", comments_to_markdown(&comments));
    }
    Ok(())
}

async fn resolve(
    strategy: &str,
    owner: Option<String>,
    repo: Option<String>,
    branch: Option<String>,
    host: Option<String>,
) -> anyhow::Result<()> {
    let strategy: SelectStrategy = strategy.parse()?;

    let settings = Settings::global().clone();
    let provider = GitHubProvider::new(settings).context("failed to build GitHub client")?;

    let (host, owner, repo, branch) = match (owner, repo, branch) {
        (Some(owner), Some(repo), branch @ Some(_)) => (host, owner, repo, branch),
        (owner, repo, branch) => {
            let context = GitDetector::new()
                .detect()
                .context("could not detect git context; pass --owner/--repo/--branch")?;
            (
                host.or(Some(context.host)),
                owner.unwrap_or(context.owner),
                repo.unwrap_or(context.repo),
                branch.or(Some(context.branch)),
            )
        }
    };

    let url = provider
        .fetcher()
        .resolve_pr_url(&ResolveRequest {
            host,
            owner,
            repo,
            branch,
            strategy,
        })
        .await?;
    println!("{url}");
    Ok(())
}
