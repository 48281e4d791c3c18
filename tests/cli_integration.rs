use std::{
    collections::HashMap,
    io::Write,
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use prtriage::{
    AuthorRole, CheckState, Comment, ConfigError, Forge, Mergeable, PullRequest, PullRequestCache,
    Repo, ScanReport, load_repositories, parse_args, render_report, scan,
};

/// Fixed clock for every test.
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

/// Mock GitHub for testing: canned pull requests per repository, or a failure.
pub struct MockHub {
    repos: HashMap<String, std::result::Result<Vec<PullRequest>, String>>,
    maintainers: Vec<String>,
    calls: AtomicUsize,
}

impl MockHub {
    pub fn new() -> Self {
        Self {
            repos: HashMap::new(),
            maintainers: vec!["maintainer".to_string()],
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_repo(mut self, repo: &str, pulls: Vec<PullRequest>) -> Self {
        self.repos.insert(repo.to_string(), Ok(pulls));
        self
    }

    pub fn with_failing_repo(mut self, repo: &str, message: &str) -> Self {
        self.repos.insert(repo.to_string(), Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Forge for MockHub {
    async fn fetch_cache(&self, repo: &Repo) -> Result<PullRequestCache> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.repos.get(&repo.to_string()) {
            Some(Ok(pulls)) => Ok(PullRequestCache::new(repo.clone(), pulls.clone())
                .with_maintainers(&self.maintainers)),
            Some(Err(message)) => anyhow::bail!("{message}"),
            None => anyhow::bail!("Repository {repo} not found"),
        }
    }
}

fn pr(repo: &str, number: u64, updated_days_ago: i64) -> PullRequest {
    PullRequest {
        number,
        title: format!("Change number {number}"),
        url: format!("https://github.com/{repo}/pull/{number}"),
        author: "contributor".to_string(),
        created_at: days_ago(updated_days_ago + 10),
        updated_at: days_ago(updated_days_ago),
        commit_count: 1,
        ..Default::default()
    }
}

fn comment(author: &str, role: AuthorRole, body: &str, created_days_ago: i64) -> Comment {
    Comment {
        author: author.to_string(),
        role,
        body: body.to_string(),
        created_at: days_ago(created_days_ago),
    }
}

/// Runs the whole pipeline the way the binary does, against `forge`,
/// capturing stdout and stderr.
async fn run_prtriage_test_with_diagnostics<F>(
    raw_args: Vec<&str>,
    forge: &F,
) -> Result<(ScanReport, String, String)>
where
    F: Forge + Sync,
{
    let options = parse_args(raw_args)?;
    let repos = load_repositories(&options.sources, options.timeout).await?;
    let spec = options.scan_spec(now());
    let report = scan(&repos, &spec, forge).await;

    let mut output = Vec::new();
    let mut diagnostics = Vec::new();
    render_report(&report, &options.output, &mut output, &mut diagnostics)?;
    Ok((
        report,
        String::from_utf8(output)?,
        String::from_utf8(diagnostics)?,
    ))
}

async fn run_prtriage_test<F>(raw_args: Vec<&str>, forge: &F) -> Result<(ScanReport, String)>
where
    F: Forge + Sync,
{
    let (report, output, _) = run_prtriage_test_with_diagnostics(raw_args, forge).await?;
    Ok((report, output))
}

fn widgets_and_gadgets() -> MockHub {
    MockHub::new()
        .with_repo(
            "acme/widgets",
            vec![
                pr("acme/widgets", 1, 5),
                pr("acme/widgets", 2, 45),
                pr("acme/widgets", 3, 50),
            ],
        )
        .with_repo("acme/gadgets", vec![pr("acme/gadgets", 7, 60)])
}

#[tokio::test]
async fn test_end_to_end_before_window_with_sort() {
    let forge = widgets_and_gadgets();

    let (report, output) = run_prtriage_test(
        vec![
            "prtriage",
            "-r",
            "acme/gadgets",
            "-r",
            "acme/widgets",
            "--before",
            "30",
            "--sort",
        ],
        &forge,
    )
    .await
    .unwrap();

    let counts: Vec<(String, usize)> = report
        .results
        .iter()
        .map(|r| (r.repo.to_string(), r.count))
        .collect();
    assert_eq!(
        counts,
        vec![("acme/widgets".to_string(), 2), ("acme/gadgets".to_string(), 1)]
    );

    assert_eq!(
        output,
        "=== acme/widgets ===\n\
         \x20 2 open pull requests\n\
         \x20 https://github.com/acme/widgets/pull/2 - Change number 2\n\
         \x20 https://github.com/acme/widgets/pull/3 - Change number 3\n\
         === acme/gadgets ===\n\
         \x20 1 open pull request\n\
         \x20 https://github.com/acme/gadgets/pull/7 - Change number 7\n"
    );
}

#[tokio::test]
async fn test_without_sort_keeps_repository_order() {
    let forge = widgets_and_gadgets();

    let (report, _) = run_prtriage_test(
        vec!["prtriage", "-r", "acme/gadgets", "-r", "acme/widgets"],
        &forge,
    )
    .await
    .unwrap();

    let repos: Vec<String> = report.results.iter().map(|r| r.repo.to_string()).collect();
    assert_eq!(repos, vec!["acme/gadgets", "acme/widgets"]);
}

#[tokio::test]
async fn test_after_window_keeps_recent_pulls() {
    let forge = widgets_and_gadgets();

    let (report, _) = run_prtriage_test(
        vec!["prtriage", "-r", "acme/widgets", "-r", "acme/gadgets", "-a", "30"],
        &forge,
    )
    .await
    .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].repo.to_string(), "acme/widgets");
    assert_eq!(report.results[0].count, 1);
}

#[tokio::test]
async fn test_before_and_after_is_fatal_before_any_fetch() {
    let forge = widgets_and_gadgets();

    let err = run_prtriage_test(
        vec!["prtriage", "-r", "acme/widgets", "-a", "5", "-b", "30"],
        &forge,
    )
    .await
    .unwrap_err();

    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::ConflictingWindow)
    );
    assert_eq!(err.to_string(), "Only one of -a and -b can be specified");
    assert_eq!(forge.calls(), 0);
}

#[tokio::test]
async fn test_failing_repository_is_isolated() {
    let forge = widgets_and_gadgets().with_failing_repo("acme/broken", "HTTP 502 from GitHub");

    let (report, output) = run_prtriage_test(
        vec![
            "prtriage",
            "-r",
            "acme/widgets",
            "-r",
            "acme/broken",
            "-r",
            "acme/gadgets",
        ],
        &forge,
    )
    .await
    .unwrap();

    assert_eq!(forge.calls(), 3);
    let repos: Vec<String> = report.results.iter().map(|r| r.repo.to_string()).collect();
    assert_eq!(repos, vec!["acme/widgets", "acme/gadgets"]);
    assert!(!output.contains("acme/broken"));

    assert_eq!(report.skipped.len(), 1);
}

#[tokio::test]
async fn test_skipped_diagnostics_only_when_verbose() {
    let forge = widgets_and_gadgets()
        .with_failing_repo("acme/broken", "HTTP 502 from GitHub")
        .with_failing_repo(
            "acme/flaky",
            "client error (Connect)\nFound at\n   0: backtrace::capture\n   1: _start",
        );
    let args = vec![
        "prtriage",
        "-r",
        "acme/widgets",
        "-r",
        "acme/broken",
        "-r",
        "acme/flaky",
    ];

    let (_, quiet_output, quiet_diagnostics) =
        run_prtriage_test_with_diagnostics(args.clone(), &forge)
            .await
            .unwrap();
    assert_eq!(quiet_diagnostics, "");

    let mut verbose_args = args;
    verbose_args.push("-v");
    let (_, verbose_output, verbose_diagnostics) =
        run_prtriage_test_with_diagnostics(verbose_args, &forge)
            .await
            .unwrap();
    assert_eq!(
        verbose_diagnostics,
        "Unable to fetch pull requests for acme/broken: HTTP 502 from GitHub\n\
         Unable to fetch pull requests for acme/flaky: client error (Connect)\n"
    );
    assert_eq!(verbose_output, quiet_output);
    assert!(!verbose_output.contains("acme/broken"));
}

#[tokio::test]
async fn test_show_empty() {
    let forge = widgets_and_gadgets().with_repo("acme/quiet", vec![]);
    let args = vec!["prtriage", "-r", "acme/quiet", "-r", "acme/gadgets"];

    let (report, output) = run_prtriage_test(args.clone(), &forge).await.unwrap();
    assert_eq!(report.results.len(), 1);
    assert!(!output.contains("acme/quiet"));

    let mut with_empty = args;
    with_empty.push("--show-empty");
    let (report, output) = run_prtriage_test(with_empty, &forge).await.unwrap();
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].count, 0);
    assert!(output.starts_with("=== acme/quiet ===\n  no open pull requests\n"));
}

#[tokio::test]
async fn test_count_only_emits_no_pull_lines() {
    let forge = widgets_and_gadgets();

    let (report, output) = run_prtriage_test(
        vec!["prtriage", "-r", "acme/widgets", "-c"],
        &forge,
    )
    .await
    .unwrap();

    assert_eq!(report.results[0].count, 3);
    assert!(report.results[0].pulls.is_none());
    assert_eq!(output, "=== acme/widgets ===\n  3 open pull requests\n");
}

#[tokio::test]
async fn test_needs_closing_preset() {
    let repo = "acme/widgets";
    let mut stale_owner_reply = pr(repo, 1, 35);
    stale_owner_reply.comments = vec![
        comment("contributor", AuthorRole::Contributor, "ready for review", 40),
        comment("owner", AuthorRole::Owner, "needs tests", 35),
    ];
    let mut fresh_owner_reply = pr(repo, 2, 3);
    fresh_owner_reply.comments = vec![comment("owner", AuthorRole::Owner, "ping?", 3)];
    let mut contributor_last = pr(repo, 3, 40);
    contributor_last.comments = vec![
        comment("maintainer", AuthorRole::NoAssociation, "rebase please", 45),
        comment("contributor", AuthorRole::Contributor, "done", 40),
    ];

    let forge = MockHub::new().with_repo(
        repo,
        vec![stale_owner_reply, fresh_owner_reply, contributor_last],
    );

    let (report, _) = run_prtriage_test(vec!["prtriage", "-r", repo, "--needs-closing"], &forge)
        .await
        .unwrap();

    let numbers: Vec<u64> = report.results[0]
        .pulls
        .as_ref()
        .unwrap()
        .iter()
        .map(|pr| pr.number)
        .collect();
    assert_eq!(numbers, vec![1]);
}

#[tokio::test]
async fn test_no_response_preset_matches_before_30() {
    let forge = widgets_and_gadgets();

    let (preset, _) = run_prtriage_test(
        vec!["prtriage", "-r", "acme/widgets", "--no-response"],
        &forge,
    )
    .await
    .unwrap();
    let (explicit, _) = run_prtriage_test(
        vec!["prtriage", "-r", "acme/widgets", "-b", "30"],
        &forge,
    )
    .await
    .unwrap();

    assert_eq!(preset, explicit);
    assert_eq!(preset.results[0].count, 2);
}

#[tokio::test]
async fn test_preset_with_explicit_window_is_rejected() {
    let forge = widgets_and_gadgets();

    let err = run_prtriage_test(
        vec!["prtriage", "-r", "acme/widgets", "--needs-closing", "-b", "60"],
        &forge,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::PresetWindowConflict { .. })
    ));
    assert_eq!(forge.calls(), 0);
}

#[tokio::test]
async fn test_selector_priority_across_flags() {
    let repo = "acme/widgets";
    let mut conflicting = pr(repo, 1, 1);
    conflicting.mergeable = Mergeable::Conflicting;
    let mut failing = pr(repo, 2, 1);
    failing.status = Some(CheckState::Failure);
    let mut squashable = pr(repo, 3, 1);
    squashable.commit_count = 5;

    let forge = MockHub::new().with_repo(repo, vec![conflicting, failing, squashable]);

    let selected = |report: &ScanReport| -> Vec<u64> {
        report.results[0]
            .pulls
            .as_ref()
            .unwrap()
            .iter()
            .map(|pr| pr.number)
            .collect()
    };

    let (report, _) = run_prtriage_test(
        vec!["prtriage", "-r", repo, "--needs-squashed", "--bad-status"],
        &forge,
    )
    .await
    .unwrap();
    assert_eq!(selected(&report), vec![2]);

    let (report, _) = run_prtriage_test(
        vec![
            "prtriage",
            "-r",
            repo,
            "--needs-squashed",
            "--bad-status",
            "--needs-rebase",
        ],
        &forge,
    )
    .await
    .unwrap();
    assert_eq!(selected(&report), vec![1]);

    let (report, _) = run_prtriage_test(vec!["prtriage", "-r", repo, "--needs-squashed"], &forge)
        .await
        .unwrap();
    assert_eq!(selected(&report), vec![3]);
}

#[tokio::test]
async fn test_mentions_and_maintainer_comment_selectors() {
    let repo = "acme/widgets";
    let mut mentions = pr(repo, 1, 1);
    mentions.comments = vec![comment("contributor", AuthorRole::Contributor, "@maintainer ping", 1)];
    mentions.comment_count = 1;
    let mut answered = pr(repo, 2, 1);
    answered.comments = vec![comment("someone", AuthorRole::Collaborator, "LGTM", 1)];
    answered.comment_count = 1;
    let silent = pr(repo, 3, 1);

    let forge = MockHub::new().with_repo(repo, vec![mentions, answered, silent]);

    let (report, _) = run_prtriage_test(
        vec!["prtriage", "-r", repo, "--last-comment-mention-member"],
        &forge,
    )
    .await
    .unwrap();
    assert_eq!(report.results[0].count, 1);

    let (report, _) =
        run_prtriage_test(vec!["prtriage", "-r", repo, "--no-puppet-comments"], &forge)
            .await
            .unwrap();
    assert_eq!(report.results[0].count, 2);

    let (report, _) = run_prtriage_test(vec!["prtriage", "-r", repo, "--no-comments"], &forge)
        .await
        .unwrap();
    assert_eq!(report.results[0].count, 1);
}

#[tokio::test]
async fn test_repository_list_file_order() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "gadgets": {{"github": "acme/gadgets"}},
            "widgets": {{"github": "acme/widgets"}}
        }}"#
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let forge = widgets_and_gadgets();
    let (report, _) = run_prtriage_test(vec!["prtriage", "-f", path.as_str()], &forge)
        .await
        .unwrap();

    let repos: Vec<String> = report.results.iter().map(|r| r.repo.to_string()).collect();
    assert_eq!(repos, vec!["acme/gadgets", "acme/widgets"]);
}

#[tokio::test]
async fn test_no_repository_source_is_config_error() {
    let forge = MockHub::new();
    let err = run_prtriage_test(vec!["prtriage", "--needs-rebase"], &forge)
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::NoRepositories)
    );
}
