use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Parser};
use url::Url;

use crate::{
    config::RepoSources,
    error::ConfigError,
    scan::ScanSpec,
    selector::{Preset, Selection, Selector, SelectorFlags},
    types::Repo,
    window::{MAX_WINDOW_DAYS, WindowSpec},
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

const DEFAULT_JOBS: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Args, Debug, Clone, Default)]
struct SelectorArgs {
    /// Select PRs which had no response in the last 30 days
    #[arg(long = "no-response", help_heading = "Selectors")]
    pub no_response: bool,

    /// Select PRs where the last response is from an owner, but no further activity for the last 30 days
    #[arg(long = "needs-closing", help_heading = "Selectors")]
    pub needs_closing: bool,

    /// Select PRs where the status is bad
    #[arg(long = "bad-status", help_heading = "Selectors")]
    pub bad_status: bool,

    /// Select PRs that need squashed
    #[arg(long = "needs-squashed", alias = "needs-squash", help_heading = "Selectors")]
    pub needs_squashed: bool,

    /// Select PRs where they need a rebase
    #[arg(long = "needs-rebase", help_heading = "Selectors")]
    pub needs_rebase: bool,

    /// Select PRs where there are no comments
    #[arg(long = "no-comments", help_heading = "Selectors")]
    pub no_comments: bool,

    /// Select PRs where there are no comments from maintainers
    #[arg(
        long = "no-puppet-comments",
        alias = "no-maintainer-comments",
        help_heading = "Selectors"
    )]
    pub no_maintainer_comments: bool,

    /// Select PRs where the last comment mentions a maintainer
    #[arg(long = "last-comment-mention-member", help_heading = "Selectors")]
    pub last_comment_mention_member: bool,

    /// Select PRs where there has been no activity in 40 days
    #[arg(long = "no-activity-40-days", help_heading = "Selectors")]
    pub no_activity_40_days: bool,
}

#[derive(Args, Debug, Clone, Default)]
struct SourceArgs {
    /// JSON repository list: {"key": {"github": "owner/name"}, ...}
    #[arg(short = 'f', long, value_name = "PATH", help_heading = "Repositories")]
    pub file: Option<PathBuf>,

    /// URL of a JSON repository list
    #[arg(short = 'u', long, value_name = "URL", help_heading = "Repositories")]
    pub url: Option<Url>,

    /// Repository to scan (can specify multiple)
    #[arg(short = 'r', long, value_name = "OWNER/NAME", help_heading = "Repositories")]
    pub repo: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(
    name = "prtriage",
    about = "Triage open pull requests across many GitHub repositories"
)]
#[command(version, long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// Pull requests that were last updated after DAYS days ago
    #[arg(short = 'a', long, value_name = "DAYS")]
    pub after: Option<u32>,

    /// Pull requests that were last updated before DAYS days ago
    #[arg(short = 'b', long, value_name = "DAYS")]
    pub before: Option<u32>,

    /// Only print the count of pull requests
    #[arg(short = 'c', long)]
    pub count: bool,

    /// List repos with no pull requests
    #[arg(short = 'e', long = "show-empty")]
    pub show_empty: bool,

    /// Sort output based on number of pull requests
    #[arg(short = 's', long)]
    pub sort: bool,

    /// Report repositories that could not be fetched
    #[arg(short = 'v', long)]
    pub verbose: bool,

    #[command(flatten)]
    pub selectors: SelectorArgs,

    #[command(flatten)]
    pub sources: SourceArgs,

    /// Treat LOGIN as a maintainer in every repository (can specify multiple)
    #[arg(short = 'm', long = "maintainer", value_name = "LOGIN")]
    pub maintainers: Vec<String>,

    /// GitHub token (defaults to GITHUB_TOKEN, GH_TOKEN, then `gh auth token`)
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Number of repositories fetched concurrently
    #[arg(short = 'j', long, default_value_t = DEFAULT_JOBS, value_name = "NUM")]
    pub jobs: usize,

    /// Give up on a repository after SECS seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_name = "SECS")]
    pub timeout: u64,
}

impl CliArgs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.after.is_some() && self.before.is_some() {
            return Err(ConfigError::ConflictingWindow);
        }
        if let Some(days) = self.after.or(self.before).filter(|days| *days > MAX_WINDOW_DAYS) {
            return Err(ConfigError::InvalidWindow {
                days,
                max: MAX_WINDOW_DAYS,
            });
        }
        if self.jobs == 0 {
            return Err(ConfigError::InvalidJobs);
        }
        if self.timeout == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.sources.file.is_none() && self.sources.url.is_none() && self.sources.repo.is_empty()
        {
            return Err(ConfigError::NoRepositories);
        }
        Ok(())
    }

    fn window(&self) -> Option<WindowSpec> {
        match (self.before, self.after) {
            (Some(days), _) => Some(WindowSpec::older_than(days)),
            (_, Some(days)) => Some(WindowSpec::newer_than(days)),
            (None, None) => None,
        }
    }

    fn selector_flags(&self) -> SelectorFlags {
        let s = &self.selectors;
        SelectorFlags {
            last_comment_by_owner: false,
            needs_rebase: s.needs_rebase,
            bad_status: s.bad_status,
            needs_squash: s.needs_squashed,
            no_comments: s.no_comments,
            last_comment_mentions_member: s.last_comment_mention_member,
            no_maintainer_comments: s.no_maintainer_comments,
            no_activity_40_days: s.no_activity_40_days,
        }
    }

    fn presets(&self) -> Vec<Preset> {
        let mut presets = Vec::new();
        if self.selectors.no_response {
            presets.push(Preset::NoResponse);
        }
        if self.selectors.needs_closing {
            presets.push(Preset::NeedsClosing);
        }
        presets
    }
}

/// How results are presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    pub count_only: bool,
    pub show_empty: bool,
    pub sort: bool,
    pub verbose: bool,
}

/// Validated options for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub selection: Selection,
    pub output: OutputOptions,
    pub sources: RepoSources,
    pub maintainers: Vec<String>,
    pub token: Option<String>,
    pub jobs: usize,
    pub timeout: Duration,
}

impl Options {
    /// Fixes the selector and window against `now`.
    pub fn scan_spec(&self, now: DateTime<Utc>) -> ScanSpec {
        ScanSpec {
            selector: Selector::new(self.selection.mode, now),
            window: self.selection.window.map(|window| window.at(now)),
            show_empty: self.output.show_empty,
            sort: self.output.sort,
            count_only: self.output.count_only,
            jobs: self.jobs,
            timeout: self.timeout,
        }
    }
}

fn parse_repo_args(repos: &[String]) -> Result<Vec<Repo>, ConfigError> {
    repos
        .iter()
        .map(|value| {
            Repo::parse(value).map_err(|source| ConfigError::InvalidRepo {
                value: value.clone(),
                source,
            })
        })
        .collect()
}

fn build_options(cli: CliArgs) -> Result<Options, ConfigError> {
    cli.validate()?;

    let selection = Selection::resolve(cli.selector_flags(), &cli.presets(), cli.window())?;
    let repos = parse_repo_args(&cli.sources.repo)?;

    Ok(Options {
        selection,
        output: OutputOptions {
            count_only: cli.count,
            show_empty: cli.show_empty,
            sort: cli.sort,
            verbose: cli.verbose,
        },
        sources: RepoSources {
            file: cli.sources.file,
            url: cli.sources.url,
            repos,
        },
        maintainers: cli.maintainers,
        token: cli.token,
        jobs: cli.jobs,
        timeout: Duration::from_secs(cli.timeout),
    })
}

/// Parses command-line arguments into validated [`Options`].
///
/// Errors are either a [`clap::Error`] (usage, help, version) or a
/// [`ConfigError`]; both surface before any repository is touched.
pub fn parse_args<I, T>(args: I) -> Result<Options>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    Ok(build_options(cli)?)
}
