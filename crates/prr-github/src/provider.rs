//! HTTP-backed implementation of the [`PrProvider`] seam.

use async_trait::async_trait;

use prr_core::{
    FetchOverrides, PrProvider, ResolveRequest, Result, ReviewComment, Settings,
};

use crate::rest::CommentFetcher;
use crate::urls;

/// GitHub-backed provider wired from settings.
///
/// Fetches go through GraphQL so comments carry thread resolution
/// state; URL resolution combines the GraphQL head lookup with the
/// REST open-PR listing.
pub struct GitHubProvider {
    fetcher: CommentFetcher,
    settings: Settings,
}

impl GitHubProvider {
    pub fn new(settings: Settings) -> Result<Self> {
        let fetcher = CommentFetcher::new(settings.clone())?;
        Ok(Self { fetcher, settings })
    }

    pub fn fetcher(&self) -> &CommentFetcher {
        &self.fetcher
    }
}

#[async_trait]
impl PrProvider for GitHubProvider {
    async fn fetch_comments(
        &self,
        pr_url: &str,
        overrides: &FetchOverrides,
    ) -> Result<Option<Vec<ReviewComment>>> {
        let locator = urls::parse_pr_url(pr_url)?;
        let limits = self.settings.limits(overrides);
        self.fetcher.fetch_graphql(&locator, &limits).await
    }

    async fn resolve_open_pr(&self, request: &ResolveRequest) -> Result<String> {
        self.fetcher.resolve_pr_url(request).await
    }
}
