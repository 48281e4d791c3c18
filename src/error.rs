use thiserror::Error;

use crate::types::RepoError;

/// Problems with the requested run, detected before any repository is
/// contacted. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Only one of -a and -b can be specified")]
    ConflictingWindow,

    #[error("--{preset} implies --before 30 and cannot be combined with -a or -b")]
    PresetWindowConflict { preset: &'static str },

    #[error("No repositories to scan: use --file, --url or --repo")]
    NoRepositories,

    #[error("Invalid repository '{value}': {source}")]
    InvalidRepo {
        value: String,
        #[source]
        source: RepoError,
    },

    #[error("-a/-b accept at most {max} days, got {days}")]
    InvalidWindow { days: u32, max: u32 },

    #[error("--jobs must be at least 1")]
    InvalidJobs,

    #[error("--timeout must be at least 1 second")]
    InvalidTimeout,
}
