//! Clip value types: the registry record and the extraction request.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::token::ClipToken;

/// Shortest clip that survives the millisecond precision of the cut
/// arguments.
pub const MIN_CLIP_SECONDS: f64 = 0.001;

/// One generated clip artifact.
///
/// The record exclusively owns the file at `output_path` until it is
/// reclaimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRecord {
    /// Public handle and registry key.
    pub token: ClipToken,
    /// Absolute path of the generated artifact.
    pub output_path: PathBuf,
    /// When the clip was registered.
    pub created_at: DateTime<Utc>,
    /// Instant after which the clip may be reclaimed.
    pub expires_at: DateTime<Utc>,
}

impl ClipRecord {
    /// Whether the clip is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Time left before expiry, clamped at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// A single clip creation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Media file to cut from.
    pub source_path: PathBuf,
    /// Seek offset in seconds.
    pub start_seconds: f64,
    /// End offset in seconds; `end - start` is the clip duration.
    pub end_seconds: f64,
    /// Lifetime override in hours; values `<= 0` fall back to the default.
    #[serde(default)]
    pub expire_hours_override: Option<i64>,
}

impl ExtractionRequest {
    /// Create a request with no expiry override.
    pub fn new(source_path: impl Into<PathBuf>, start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            source_path: source_path.into(),
            start_seconds,
            end_seconds,
            expire_hours_override: None,
        }
    }

    /// Clip duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// Effective lifetime in hours given the configured default.
    pub fn expire_hours(&self, default_hours: u32) -> i64 {
        match self.expire_hours_override {
            Some(hours) if hours > 0 => hours,
            _ => i64::from(default_hours),
        }
    }

    /// Check the inputs that need no filesystem access: a non-empty path and
    /// a finite `0 <= start < end` range.
    pub fn validate(&self) -> Result<()> {
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::Validation("source path is required".into()));
        }
        validate_range(self.start_seconds, self.end_seconds)
    }

    /// Check that the source exists and is a regular file.
    pub fn check_source(&self) -> Result<()> {
        check_source_file(&self.source_path)
    }
}

/// Validate a `0 <= start < end` time range at least [`MIN_CLIP_SECONDS`] long.
pub fn validate_range(start_seconds: f64, end_seconds: f64) -> Result<()> {
    if !start_seconds.is_finite() || !end_seconds.is_finite() {
        return Err(Error::Validation("start and end must be finite numbers".into()));
    }
    if start_seconds < 0.0 {
        return Err(Error::Validation(format!(
            "start must not be negative (got {start_seconds})"
        )));
    }
    if end_seconds <= start_seconds {
        return Err(Error::Validation(format!(
            "end ({end_seconds}) must be greater than start ({start_seconds})"
        )));
    }
    // Durations are written with three decimals; anything that rounds to
    // zero milliseconds would ask for an empty cut.
    if ((end_seconds - start_seconds) / MIN_CLIP_SECONDS).round() < 1.0 {
        return Err(Error::Validation(format!(
            "clip must be at least {MIN_CLIP_SECONDS}s long (got {start_seconds}..{end_seconds})"
        )));
    }
    Ok(())
}

/// Return `NotFound` unless `path` is an existing regular file.
pub fn check_source_file(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(Error::not_found("source file", path.display())),
    }
}
