use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use tracing::debug;

use crate::{
    graphql::{GraphQLResponse, PAGE_SIZE, PageInfo, convert_pull_request, create_graphql_query},
    types::{Forge, PullRequestCache, Repo},
};

/// Upper bound on pages fetched per repository.
const MAX_PAGES: usize = 20;

/// Cursor for the next page, or `None` once the last page has been read.
///
/// Running out of pages before GitHub does is an error: a partial listing
/// would understate the repository's counts.
fn next_page_cursor(repo: &Repo, page_info: PageInfo, page_count: usize) -> Result<Option<String>> {
    if !page_info.has_next_page {
        return Ok(None);
    }
    let Some(cursor) = page_info.end_cursor else {
        anyhow::bail!("Repository {repo}: more pull requests reported but no page cursor");
    };
    if page_count >= MAX_PAGES {
        anyhow::bail!(
            "Repository {repo} has more than {} open pull requests",
            MAX_PAGES * PAGE_SIZE as usize
        );
    }
    Ok(Some(cursor))
}

/// Resolves a GitHub token: explicit value, then `GITHUB_TOKEN`, then
/// `GH_TOKEN`, then `gh auth token`.
pub fn get_github_token(explicit: Option<&str>) -> Result<String> {
    if let Some(token) = explicit.map(str::trim).filter(|token| !token.is_empty()) {
        return Ok(token.to_string());
    }

    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        return Ok(token);
    }

    if let Ok(token) = std::env::var("GH_TOKEN") {
        return Ok(token);
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("No GitHub token in --token, GITHUB_TOKEN or GH_TOKEN, and gh CLI is unavailable")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// Creates an authenticated GitHub client using available credentials.
pub fn setup_github_client(explicit_token: Option<&str>) -> Result<Octocrab> {
    let token =
        get_github_token(explicit_token).context("Failed to obtain GitHub authentication token")?;
    Octocrab::builder()
        .personal_token(token)
        .build()
        .context("Failed to create GitHub client")
}

/// [`Forge`] backed by the GitHub GraphQL API.
pub struct GitHub {
    client: Octocrab,
    maintainers: Vec<String>,
}

impl GitHub {
    /// `maintainers` are extra handles treated as maintainers in every
    /// repository, on top of those GitHub reports.
    pub fn new(client: Octocrab, maintainers: Vec<String>) -> Self {
        Self {
            client,
            maintainers,
        }
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn fetch_cache(&self, repo: &Repo) -> Result<PullRequestCache> {
        let mut pulls = Vec::new();
        let mut maintainers = self.maintainers.clone();
        let mut after_cursor: Option<String> = None;
        let mut page_count = 0;

        loop {
            page_count += 1;
            let query = create_graphql_query(repo.owner(), repo.name(), after_cursor.as_deref());

            let response: GraphQLResponse = self
                .client
                .graphql(&query)
                .await
                .with_context(|| format!("GraphQL request for {repo} failed"))?;

            let repository = response
                .data
                .and_then(|data| data.repository)
                .ok_or_else(|| {
                    let messages: Vec<String> =
                        response.errors.into_iter().map(|e| e.message).collect();
                    if messages.is_empty() {
                        anyhow::anyhow!("Repository {repo} not found")
                    } else {
                        anyhow::anyhow!("Repository {repo}: {}", messages.join("; "))
                    }
                })?;

            if page_count == 1 {
                maintainers.push(repository.owner.login);
            }

            let connection = repository.pull_requests;
            debug!(
                repo = %repo,
                page = page_count,
                pulls = connection.nodes.len(),
                "Fetched pull request page"
            );

            for node in connection.nodes {
                let pr = convert_pull_request(node);
                maintainers.extend(
                    pr.comments
                        .iter()
                        .filter(|comment| comment.role.is_maintainer())
                        .map(|comment| comment.author.clone()),
                );
                pulls.push(pr);
            }

            after_cursor = next_page_cursor(repo, connection.page_info, page_count)?;
            if after_cursor.is_none() {
                break;
            }
        }

        Ok(PullRequestCache::new(repo.clone(), pulls).with_maintainers(maintainers))
    }
}
