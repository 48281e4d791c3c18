//! prtriage: pull request triage across many GitHub repositories.
//!
//! Scans a list of repositories, selects the open pull requests matching one
//! review-state selector (needs rebase, failing status, stale maintainer
//! reply, ...), optionally narrows them to a time window, and renders a
//! per-repository summary. A repository that cannot be fetched is skipped
//! without affecting the rest of the scan.

pub mod cli;
pub mod config;
pub mod error;
pub mod github;
pub mod graphql;
pub mod render;
pub mod scan;
pub mod selector;
pub mod types;
pub mod window;

pub use cli::{Options, OutputOptions, parse_args};
pub use config::{RepoSources, load_repositories, parse_repo_list};
pub use error::ConfigError;
pub use github::GitHub;
pub use render::{format_count, render, render_report, render_skipped};
pub use scan::{RepoOutcome, RepoResult, ScanReport, ScanSpec, SkippedRepo, aggregate, evaluate_repo, scan};
pub use selector::{Preset, Selection, Selector, SelectorFlags, SelectorMode};
pub use types::{
    AuthorRole, CheckState, Comment, Forge, Mergeable, PullRequest, PullRequestCache, Repo,
    RepoDescriptor, RepoError,
};
pub use window::{TimeWindow, WindowDirection, WindowSpec};
