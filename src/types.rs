use std::{collections::BTreeSet, fmt, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while validating an `owner/name` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    #[error("repository must be in format 'owner/name', got: '{0}'")]
    InvalidFormat(String),
    #[error("repository owner cannot be empty")]
    EmptyOwner,
    #[error("repository name cannot be empty")]
    EmptyName,
}

/// A validated GitHub repository coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();

        if owner.contains('/') || name.contains('/') {
            return Err(RepoError::InvalidFormat(format!("{owner}/{name}")));
        }
        if owner.trim().is_empty() {
            return Err(RepoError::EmptyOwner);
        }
        if name.trim().is_empty() {
            return Err(RepoError::EmptyName);
        }

        Ok(Self { owner, name })
    }

    /// Parses `owner/name`, rejecting anything with more or fewer parts.
    pub fn parse(repo: &str) -> Result<Self, RepoError> {
        let repo = repo.trim();
        let Some((owner, name)) = repo.split_once('/') else {
            return Err(RepoError::InvalidFormat(repo.to_string()));
        };
        if name.contains('/') {
            return Err(RepoError::InvalidFormat(repo.to_string()));
        }
        Self::new(owner, name)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for Repo {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One entry of the repository list: the key it was listed under and where it
/// lives on GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDescriptor {
    pub key: String,
    pub repo: Repo,
}

impl RepoDescriptor {
    pub fn new(key: impl Into<String>, repo: Repo) -> Self {
        Self {
            key: key.into(),
            repo,
        }
    }
}

impl From<Repo> for RepoDescriptor {
    fn from(repo: Repo) -> Self {
        Self {
            key: repo.to_string(),
            repo,
        }
    }
}

/// GitHub's relationship between a comment author and the repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorRole {
    Owner,
    Member,
    Collaborator,
    Contributor,
    FirstTimeContributor,
    FirstTimer,
    Mannequin,
    #[default]
    #[serde(rename = "NONE", other)]
    NoAssociation,
}

impl AuthorRole {
    pub fn is_maintainer(&self) -> bool {
        matches!(
            self,
            AuthorRole::Owner | AuthorRole::Member | AuthorRole::Collaborator
        )
    }
}

/// Whether GitHub can merge the pull request head into its base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mergeable {
    Mergeable,
    Conflicting,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Rolled-up commit status of the pull request head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckState {
    Success,
    Failure,
    Error,
    Pending,
    Expected,
    /// A state this client does not know about.
    #[serde(other)]
    Unknown,
}

impl CheckState {
    pub fn is_failing(&self) -> bool {
        matches!(self, CheckState::Failure | CheckState::Error)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comment {
    pub author: String,
    pub role: AuthorRole,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// An open pull request with everything the selectors look at.
///
/// `comments` holds only the most recent comments GitHub returned;
/// `comment_count` is the total regardless of how many were fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub mergeable: Mergeable,
    pub status: Option<CheckState>,
    pub commit_count: u64,
    pub head_committed_at: Option<DateTime<Utc>>,
    pub comment_count: u64,
    pub comments: Vec<Comment>,
}

impl PullRequest {
    pub fn last_comment(&self) -> Option<&Comment> {
        self.comments.iter().max_by_key(|comment| comment.created_at)
    }

    /// Most recent of the update time, the last comment and the head commit.
    pub fn last_activity(&self) -> DateTime<Utc> {
        [
            Some(self.updated_at),
            self.last_comment().map(|comment| comment.created_at),
            self.head_committed_at,
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(self.updated_at)
    }

    pub fn needs_rebase(&self) -> bool {
        self.mergeable == Mergeable::Conflicting
    }

    pub fn has_bad_status(&self) -> bool {
        self.status.is_some_and(|state| state.is_failing())
    }

    pub fn needs_squash(&self) -> bool {
        self.commit_count > 1
    }
}

/// Everything fetched for one repository, built once and then only read.
#[derive(Debug, Clone)]
pub struct PullRequestCache {
    repo: Repo,
    pulls: Vec<PullRequest>,
    maintainers: BTreeSet<String>,
}

impl PullRequestCache {
    pub fn new(repo: Repo, pulls: Vec<PullRequest>) -> Self {
        Self {
            repo,
            pulls,
            maintainers: BTreeSet::new(),
        }
    }

    /// Adds maintainer handles. Handles are compared case-insensitively and a
    /// leading `@` is ignored.
    pub fn with_maintainers<I, S>(mut self, handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.maintainers.extend(
            handles
                .into_iter()
                .map(|handle| normalize_handle(handle.as_ref()))
                .filter(|handle| !handle.is_empty()),
        );
        self
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    pub fn pulls(&self) -> &[PullRequest] {
        &self.pulls
    }

    pub fn maintainers(&self) -> &BTreeSet<String> {
        &self.maintainers
    }

    pub fn is_maintainer(&self, login: &str) -> bool {
        self.maintainers.contains(&normalize_handle(login))
    }

    pub fn is_maintainer_comment(&self, comment: &Comment) -> bool {
        comment.role.is_maintainer() || self.is_maintainer(&comment.author)
    }
}

fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_ascii_lowercase()
}

/// Source of pull request data for a repository.
#[async_trait]
pub trait Forge {
    async fn fetch_cache(&self, repo: &Repo) -> anyhow::Result<PullRequestCache>;
}
