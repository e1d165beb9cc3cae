//! Error types for clipshare-av.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias using [`ExtractionError`].
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Errors that can occur while running an external tool or an extraction job.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The requested time range or arguments are unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The source media file does not exist or is not a regular file.
    #[error("source file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// The process could not be started (missing binary, permission denied).
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran but reported failure.
    #[error("{tool} exited with {}: {}", describe_code(.code), .stderr_tail.join(" | "))]
    NonZeroExit {
        tool: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Last captured standard-error lines.
        stderr_tail: Vec<String>,
    },

    /// The process exited cleanly but left no usable output file.
    #[error("{tool} completed but no output was produced at {}", path.display())]
    MissingOutput { tool: String, path: PathBuf },

    /// The process exceeded its wall-clock budget and was killed.
    #[error("{tool} timed out after {timeout:?}")]
    TimedOut { tool: String, timeout: Duration },

    /// An I/O error outside the process itself (e.g. creating the output directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "no exit code (killed by signal)".to_string(),
    }
}

impl From<ExtractionError> for clipshare_core::Error {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::InvalidInput(msg) => clipshare_core::Error::Validation(msg),
            ExtractionError::SourceNotFound { path } => {
                clipshare_core::Error::not_found("source file", path.display())
            }
            ExtractionError::Io(source) => clipshare_core::Error::Io { source },
            other => clipshare_core::Error::Extraction(other.to_string()),
        }
    }
}
