use chrono::{DateTime, Duration, Utc};

use crate::types::PullRequest;

/// Largest day count accepted for `-a`/`-b`.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Which side of the threshold a pull request's last update must fall on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDirection {
    /// Last updated on or before the threshold (`-b/--before`).
    OlderThan,
    /// Last updated on or after the threshold (`-a/--after`).
    NewerThan,
}

/// A window as given on the command line: a direction and a day count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub direction: WindowDirection,
    pub days: u32,
}

impl WindowSpec {
    pub const fn older_than(days: u32) -> Self {
        Self {
            direction: WindowDirection::OlderThan,
            days,
        }
    }

    pub const fn newer_than(days: u32) -> Self {
        Self {
            direction: WindowDirection::NewerThan,
            days,
        }
    }

    /// Fixes the threshold at `days` before `now`, saturating at the
    /// earliest representable time.
    pub fn at(&self, now: DateTime<Utc>) -> TimeWindow {
        let threshold = Duration::try_days(i64::from(self.days))
            .and_then(|days| now.checked_sub_signed(days))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        TimeWindow {
            direction: self.direction,
            threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub direction: WindowDirection,
    pub threshold: DateTime<Utc>,
}

impl TimeWindow {
    pub fn admits(&self, pr: &PullRequest) -> bool {
        match self.direction {
            WindowDirection::OlderThan => pr.updated_at <= self.threshold,
            WindowDirection::NewerThan => pr.updated_at >= self.threshold,
        }
    }

    /// Keeps the pull requests inside the window, preserving their order.
    pub fn apply(&self, pulls: Vec<PullRequest>) -> Vec<PullRequest> {
        pulls.into_iter().filter(|pr| self.admits(pr)).collect()
    }
}

/// Applies `window` if there is one.
pub fn apply_window(pulls: Vec<PullRequest>, window: Option<&TimeWindow>) -> Vec<PullRequest> {
    match window {
        Some(window) => window.apply(pulls),
        None => pulls,
    }
}
