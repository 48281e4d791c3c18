//! Loading the list of repositories to scan.
//!
//! A repository list is a JSON object whose keys name the entries and whose
//! values give the GitHub coordinates, either as `{"github": "owner/name"}` or
//! as a bare `"owner/name"` string. Key order is the scan order.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::types::{Repo, RepoDescriptor};

/// Where the repository list comes from. Sources are combined in field order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoSources {
    pub file: Option<PathBuf>,
    pub url: Option<Url>,
    pub repos: Vec<Repo>,
}

impl RepoSources {
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.url.is_none() && self.repos.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RepoEntry {
    Bare(String),
    Detailed { github: String },
}

impl RepoEntry {
    fn github(&self) -> &str {
        match self {
            RepoEntry::Bare(github) | RepoEntry::Detailed { github } => github,
        }
    }
}

/// Parses a repository list document, keeping entry order.
pub fn parse_repo_list(json: &str) -> Result<Vec<RepoDescriptor>> {
    let entries: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).context("Repository list must be a JSON object")?;

    entries
        .into_iter()
        .map(|(key, value)| {
            let entry: RepoEntry = serde_json::from_value(value).with_context(|| {
                format!("Entry '{key}' must be \"owner/name\" or an object with a 'github' field")
            })?;
            let repo = Repo::parse(entry.github())
                .with_context(|| format!("Entry '{key}' has an invalid 'github' value"))?;
            Ok(RepoDescriptor::new(key, repo))
        })
        .collect()
}

pub fn load_repo_file(path: &Path) -> Result<Vec<RepoDescriptor>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read repository list {}", path.display()))?;
    parse_repo_list(&content)
        .with_context(|| format!("Failed to parse repository list {}", path.display()))
}

fn build_http_client(timeout: Duration) -> Result<ClientWithMiddleware> {
    let base_client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to create HTTP client")?;

    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(Duration::from_millis(100), Duration::from_secs(5))
        .build_with_max_retries(3);

    Ok(ClientBuilder::new(base_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Downloads and parses a repository list, retrying transient failures.
pub async fn fetch_repo_list(url: &Url, timeout: Duration) -> Result<Vec<RepoDescriptor>> {
    let client = build_http_client(timeout)?;

    let response = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("Failed to fetch repository list from {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP {} from {}", response.status(), url);
    }

    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read repository list from {url}"))?;
    parse_repo_list(&body).with_context(|| format!("Failed to parse repository list from {url}"))
}

/// Loads every configured source and drops repeated repositories, keeping the
/// first occurrence.
pub async fn load_repositories(
    sources: &RepoSources,
    timeout: Duration,
) -> Result<Vec<RepoDescriptor>> {
    let mut descriptors = Vec::new();

    if let Some(path) = &sources.file {
        descriptors.extend(load_repo_file(path)?);
    }

    if let Some(url) = &sources.url {
        descriptors.extend(fetch_repo_list(url, timeout).await?);
    }

    descriptors.extend(sources.repos.iter().cloned().map(RepoDescriptor::from));

    let descriptors = dedup_repositories(descriptors);
    info!(count = descriptors.len(), "Loaded repository list");
    Ok(descriptors)
}

fn dedup_repositories(descriptors: Vec<RepoDescriptor>) -> Vec<RepoDescriptor> {
    let mut seen = HashSet::new();
    descriptors
        .into_iter()
        .filter(|descriptor| {
            let fresh = seen.insert(descriptor.repo.clone());
            if !fresh {
                debug!(repo = %descriptor.repo, key = %descriptor.key, "Skipping duplicate repository");
            }
            fresh
        })
        .collect()
}
