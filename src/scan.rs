//! Per-repository evaluation and aggregation.
//!
//! Each repository is an independent unit of work: fetch its cache, run the
//! selector, apply the window. A unit that fails, hangs past the timeout or
//! panics becomes a [`SkippedRepo`] and never affects the others. Units run
//! concurrently up to `jobs` at a time; the aggregator restores repository
//! order before the optional sort so the output does not depend on which
//! fetch finished first.

use std::{panic::AssertUnwindSafe, time::Duration};

use futures::{FutureExt, StreamExt, stream};
use tracing::{debug, info};

use crate::{
    selector::Selector,
    types::{Forge, PullRequest, Repo, RepoDescriptor},
    window::{TimeWindow, apply_window},
};

/// Everything a scan needs, with the clock already fixed.
#[derive(Debug, Clone)]
pub struct ScanSpec {
    pub selector: Selector,
    pub window: Option<TimeWindow>,
    pub show_empty: bool,
    pub sort: bool,
    pub count_only: bool,
    pub jobs: usize,
    pub timeout: Duration,
}

/// Matches for one repository.
///
/// `pulls` is `None` in count-only mode; otherwise `count == pulls.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoResult {
    pub repo: Repo,
    pub pulls: Option<Vec<PullRequest>>,
    pub count: usize,
}

impl RepoResult {
    pub fn new(repo: Repo, pulls: Vec<PullRequest>) -> Self {
        Self {
            repo,
            count: pulls.len(),
            pulls: Some(pulls),
        }
    }
}

/// A repository whose unit of work failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRepo {
    pub repo: Repo,
    pub reason: String,
}

pub type RepoOutcome = Result<RepoResult, SkippedRepo>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// Kept results in output order.
    pub results: Vec<RepoResult>,
    /// Failed repositories in repository-list order.
    pub skipped: Vec<SkippedRepo>,
}

/// One-line reason built from the error's cause chain. Only the first line of
/// each cause is kept, which drops any backtrace a cause renders.
fn describe_error(err: &anyhow::Error) -> String {
    err.chain()
        .filter_map(|cause| {
            let text = cause.to_string();
            let line = text.lines().map(str::trim).find(|line| !line.is_empty())?;
            Some(line.to_string())
        })
        .collect::<Vec<_>>()
        .join(": ")
}

/// Evaluates one repository. Failures are returned, not propagated.
pub async fn evaluate_repo<F>(forge: &F, repo: &Repo, spec: &ScanSpec) -> RepoOutcome
where
    F: Forge + Sync,
{
    let skipped = |reason: String| {
        debug!(repo = %repo, reason = %reason, "Skipping repository");
        SkippedRepo {
            repo: repo.clone(),
            reason,
        }
    };

    let cache = match tokio::time::timeout(spec.timeout, forge.fetch_cache(repo)).await {
        Ok(Ok(cache)) => cache,
        Ok(Err(err)) => return Err(skipped(describe_error(&err))),
        Err(_) => {
            return Err(skipped(format!(
                "timed out after {}s",
                spec.timeout.as_secs_f64()
            )));
        }
    };

    let selected = spec.selector.select(&cache);
    let selected_count = selected.len();
    let pulls = apply_window(selected, spec.window.as_ref());

    debug!(
        repo = %repo,
        open = cache.pulls().len(),
        selected = selected_count,
        kept = pulls.len(),
        mode = %spec.selector.mode,
        "Evaluated repository"
    );

    Ok(RepoResult::new(repo.clone(), pulls))
}

/// [`evaluate_repo`] with panics contained to the repository as well.
async fn run_unit<F>(forge: &F, repo: &Repo, spec: &ScanSpec) -> RepoOutcome
where
    F: Forge + Sync,
{
    match AssertUnwindSafe(evaluate_repo(forge, repo, spec))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!(repo = %repo, "Repository evaluation panicked");
            Err(SkippedRepo {
                repo: repo.clone(),
                reason: "evaluation panicked".to_string(),
            })
        }
    }
}

/// Evaluates every repository, at most `spec.jobs` at a time, and aggregates
/// the outcomes.
pub async fn scan<F>(repos: &[RepoDescriptor], spec: &ScanSpec, forge: &F) -> ScanReport
where
    F: Forge + Sync,
{
    info!(
        repositories = repos.len(),
        mode = %spec.selector.mode,
        jobs = spec.jobs,
        "Scanning repositories"
    );

    let outcomes: Vec<(usize, RepoOutcome)> = stream::iter(repos.iter().enumerate())
        .map(|(index, descriptor)| async move {
            (index, run_unit(forge, &descriptor.repo, spec).await)
        })
        .buffer_unordered(spec.jobs.max(1))
        .collect()
        .await;

    aggregate(outcomes, spec)
}

/// Orders outcomes by repository index, drops empties unless asked to keep
/// them, sets aside failures, and sorts by descending count if requested.
pub fn aggregate(mut outcomes: Vec<(usize, RepoOutcome)>, spec: &ScanSpec) -> ScanReport {
    outcomes.sort_by_key(|(index, _)| *index);

    let mut report = ScanReport::default();

    for (_, outcome) in outcomes {
        match outcome {
            Ok(mut result) => {
                if result.count == 0 && !spec.show_empty {
                    continue;
                }
                if spec.count_only {
                    result.pulls = None;
                }
                report.results.push(result);
            }
            Err(skipped) => report.skipped.push(skipped),
        }
    }

    if spec.sort {
        // Stable, so equal counts keep repository order.
        report.results.sort_by(|a, b| b.count.cmp(&a.count));
    }

    report
}
