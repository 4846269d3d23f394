use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Root does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("Root is not a directory: {0}")]
    RootNotADirectory(PathBuf),

    #[error(
        "Found relative folder depth {found} > allowed {limit} ({} offending files)",
        violations.len()
    )]
    DepthExceeded {
        limit: usize,
        found: usize,
        violations: Vec<PathBuf>,
    },

    #[error("Refusing to rename the root directory itself: {0}")]
    RootTargeted(PathBuf),

    #[error("Failed to rename {} -> {}: {source}", path.display(), target.display())]
    Mutation {
        path: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Run log error for {}: {source}", path.display())]
    Logging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    /// Precondition failures abort before anything on disk has changed.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::RootMissing(_) | Error::RootNotADirectory(_) | Error::DepthExceeded { .. }
        )
    }
}
