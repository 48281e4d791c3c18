//! The closed set of pull request selectors and how one is chosen.
//!
//! Exactly one [`SelectorMode`] is active per run. When several selector
//! flags are given the first in [`SelectorMode::PRIORITY`] wins; nothing is
//! combined. Presets expand into a selector flag and a fixed window.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::{
    error::ConfigError,
    types::{PullRequest, PullRequestCache},
    window::WindowSpec,
};

/// Days without any activity before a pull request counts as abandoned.
pub const NO_ACTIVITY_DAYS: i64 = 40;

/// Window forced by the presets.
pub const PRESET_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorMode {
    LastCommentByOwner,
    NeedsRebase,
    BadStatus,
    NeedsSquash,
    NoComments,
    LastCommentMentionsMember,
    NoMaintainerComments,
    NoActivity40Days,
    /// Every open pull request.
    All,
}

impl SelectorMode {
    /// Resolution order for the predicate modes. `All` is the fallback and is
    /// deliberately absent.
    pub const PRIORITY: [SelectorMode; 8] = [
        SelectorMode::LastCommentByOwner,
        SelectorMode::NeedsRebase,
        SelectorMode::BadStatus,
        SelectorMode::NeedsSquash,
        SelectorMode::NoComments,
        SelectorMode::LastCommentMentionsMember,
        SelectorMode::NoMaintainerComments,
        SelectorMode::NoActivity40Days,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SelectorMode::LastCommentByOwner => "last-comment-by-owner",
            SelectorMode::NeedsRebase => "needs-rebase",
            SelectorMode::BadStatus => "bad-status",
            SelectorMode::NeedsSquash => "needs-squash",
            SelectorMode::NoComments => "no-comments",
            SelectorMode::LastCommentMentionsMember => "last-comment-mentions-member",
            SelectorMode::NoMaintainerComments => "no-maintainer-comments",
            SelectorMode::NoActivity40Days => "no-activity-in-40-days",
            SelectorMode::All => "all",
        }
    }

    pub fn matches(&self, pr: &PullRequest, cache: &PullRequestCache, now: DateTime<Utc>) -> bool {
        match self {
            SelectorMode::LastCommentByOwner => pr
                .last_comment()
                .is_some_and(|comment| cache.is_maintainer_comment(comment)),
            SelectorMode::NeedsRebase => pr.needs_rebase(),
            SelectorMode::BadStatus => pr.has_bad_status(),
            SelectorMode::NeedsSquash => pr.needs_squash(),
            SelectorMode::NoComments => pr.comment_count == 0,
            SelectorMode::LastCommentMentionsMember => pr.last_comment().is_some_and(|comment| {
                mentioned_handles(&comment.body).any(|handle| cache.is_maintainer(handle))
            }),
            SelectorMode::NoMaintainerComments => !pr
                .comments
                .iter()
                .any(|comment| cache.is_maintainer_comment(comment)),
            SelectorMode::NoActivity40Days => {
                pr.last_activity() <= now - Duration::days(NO_ACTIVITY_DAYS)
            }
            SelectorMode::All => true,
        }
    }
}

impl std::fmt::Display for SelectorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Selector flags as requested on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectorFlags {
    pub last_comment_by_owner: bool,
    pub needs_rebase: bool,
    pub bad_status: bool,
    pub needs_squash: bool,
    pub no_comments: bool,
    pub last_comment_mentions_member: bool,
    pub no_maintainer_comments: bool,
    pub no_activity_40_days: bool,
}

impl SelectorFlags {
    pub fn is_set(&self, mode: SelectorMode) -> bool {
        match mode {
            SelectorMode::LastCommentByOwner => self.last_comment_by_owner,
            SelectorMode::NeedsRebase => self.needs_rebase,
            SelectorMode::BadStatus => self.bad_status,
            SelectorMode::NeedsSquash => self.needs_squash,
            SelectorMode::NoComments => self.no_comments,
            SelectorMode::LastCommentMentionsMember => self.last_comment_mentions_member,
            SelectorMode::NoMaintainerComments => self.no_maintainer_comments,
            SelectorMode::NoActivity40Days => self.no_activity_40_days,
            SelectorMode::All => false,
        }
    }
}

/// Picks the single active mode from the flags by fixed priority.
pub fn resolve(flags: &SelectorFlags) -> SelectorMode {
    SelectorMode::PRIORITY
        .into_iter()
        .find(|mode| flags.is_set(*mode))
        .unwrap_or(SelectorMode::All)
}

/// Named shortcuts that pair a selector with a forced window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Whatever the other flags select, untouched for 30 days.
    NoResponse,
    /// Last comment by a maintainer, untouched for 30 days.
    NeedsClosing,
}

impl Preset {
    pub fn flag(&self) -> &'static str {
        match self {
            Preset::NoResponse => "no-response",
            Preset::NeedsClosing => "needs-closing",
        }
    }

    fn apply(&self, flags: &mut SelectorFlags) {
        if let Preset::NeedsClosing = self {
            flags.last_comment_by_owner = true;
        }
    }

    pub fn window(&self) -> WindowSpec {
        WindowSpec::older_than(PRESET_WINDOW_DAYS)
    }
}

/// The resolved mode and window for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub mode: SelectorMode,
    pub window: Option<WindowSpec>,
}

impl Selection {
    /// Resolves flags, presets and an explicit window into one selection.
    ///
    /// A preset together with an explicit window is rejected rather than
    /// letting either silently win.
    pub fn resolve(
        flags: SelectorFlags,
        presets: &[Preset],
        window: Option<WindowSpec>,
    ) -> Result<Self, ConfigError> {
        let mut flags = flags;
        let mut forced = None;

        for preset in presets {
            if window.is_some() {
                return Err(ConfigError::PresetWindowConflict {
                    preset: preset.flag(),
                });
            }
            preset.apply(&mut flags);
            forced = Some(preset.window());
        }

        Ok(Self {
            mode: resolve(&flags),
            window: forced.or(window),
        })
    }
}

/// A mode bound to the clock reading it is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Selector {
    pub mode: SelectorMode,
    pub now: DateTime<Utc>,
}

impl Selector {
    pub fn new(mode: SelectorMode, now: DateTime<Utc>) -> Self {
        Self { mode, now }
    }

    /// Returns the matching pull requests in cache order.
    pub fn select(&self, cache: &PullRequestCache) -> Vec<PullRequest> {
        cache
            .pulls()
            .iter()
            .filter(|pr| self.mode.matches(pr, cache, self.now))
            .cloned()
            .collect()
    }
}

/// Extracts `@handle` mentions. Email addresses are not mentions.
pub fn mentioned_handles(body: &str) -> impl Iterator<Item = &str> {
    static MENTION: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?:^|[^A-Za-z0-9_@.])@([A-Za-z0-9][A-Za-z0-9-]*)")
            .expect("mention pattern is valid")
    });

    MENTION
        .captures_iter(body)
        .filter_map(|captures| captures.get(1))
        .map(|handle| handle.as_str())
}
