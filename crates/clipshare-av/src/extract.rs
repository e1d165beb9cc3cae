//! Stream-copy clip extraction with ffmpeg.
//!
//! A clip is cut by seeking to the start offset and copying every stream for
//! the requested duration without re-encoding. The output container is
//! whatever the output path's extension tells ffmpeg to write.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::command::{ToolCommand, DEFAULT_TAIL_LINES};
use crate::error::{ExtractionError, Result};
use crate::tools::ToolRegistry;

/// A clip file that ffmpeg produced successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub elapsed: Duration,
}

/// Runs one ffmpeg process per clip.
#[derive(Debug, Clone)]
pub struct ClipExtractor {
    ffmpeg: PathBuf,
    timeout: Duration,
    tail_lines: usize,
}

impl ClipExtractor {
    /// Create an extractor for an explicit ffmpeg binary.
    pub fn new(ffmpeg: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            timeout,
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }

    /// Create an extractor from discovered tools.
    pub fn from_registry(tools: &ToolRegistry, timeout: Duration) -> Self {
        Self::new(tools.ffmpeg_path(), timeout)
    }

    /// Set how many trailing stderr lines a failure carries.
    pub fn with_tail_lines(mut self, n: usize) -> Self {
        self.tail_lines = n;
        self
    }

    /// The ffmpeg binary this extractor spawns.
    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Cut `[start_seconds, end_seconds)` of `source` into `output`.
    ///
    /// Inputs are checked before anything is spawned. On any failure after
    /// the process starts, a partially written `output` is removed.
    pub async fn run(
        &self,
        source: &Path,
        start_seconds: f64,
        end_seconds: f64,
        output: &Path,
    ) -> Result<ClipArtifact> {
        clipshare_core::clip::validate_range(start_seconds, end_seconds).map_err(|e| match e {
            clipshare_core::Error::Validation(msg) => ExtractionError::InvalidInput(msg),
            other => ExtractionError::InvalidInput(other.to_string()),
        })?;

        if !std::fs::metadata(source).map(|m| m.is_file()).unwrap_or(false) {
            return Err(ExtractionError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.args(build_args(source, start_seconds, end_seconds, output))
            .timeout(self.timeout)
            .tail_lines(self.tail_lines);

        tracing::info!(
            source = %source.display(),
            output = %output.display(),
            start = start_seconds,
            duration = end_seconds - start_seconds,
            "Extracting clip"
        );
        tracing::debug!("Running {}", cmd.display());

        let started = Instant::now();
        let result = match cmd.execute().await {
            Ok(_) => check_output(&cmd.program_name(), output),
            Err(e) => Err(e),
        };

        match result {
            Ok(size_bytes) => {
                let elapsed = started.elapsed();
                tracing::info!(
                    output = %output.display(),
                    size_bytes,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Clip extracted"
                );
                Ok(ClipArtifact {
                    path: output.to_path_buf(),
                    size_bytes,
                    elapsed,
                })
            }
            Err(e) => {
                tracing::warn!(output = %output.display(), "Clip extraction failed: {e}");
                remove_partial(output);
                Err(e)
            }
        }
    }
}

/// The ffmpeg argument list for one stream-copy cut.
///
/// Offsets are written with millisecond precision.
pub fn build_args(
    source: &Path,
    start_seconds: f64,
    end_seconds: f64,
    output: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-nostats", "-y"]
        .into_iter()
        .map(OsString::from)
        .collect();

    args.push("-ss".into());
    args.push(format!("{start_seconds:.3}").into());
    args.push("-t".into());
    args.push(format!("{:.3}", end_seconds - start_seconds).into());
    args.push("-i".into());
    args.push(source.as_os_str().to_os_string());
    for flag in ["-map", "0", "-c", "copy", "-avoid_negative_ts", "make_zero"] {
        args.push(flag.into());
    }
    args.push(output.as_os_str().to_os_string());
    args
}

/// Size of the produced file; a missing or empty file is a failure.
fn check_output(tool: &str, output: &Path) -> Result<u64> {
    match std::fs::metadata(output) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        _ => Err(ExtractionError::MissingOutput {
            tool: tool.to_string(),
            path: output.to_path_buf(),
        }),
    }
}

fn remove_partial(output: &Path) {
    match std::fs::remove_file(output) {
        Ok(()) => tracing::debug!("Removed partial output {}", output.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial output {}: {e}", output.display()),
    }
}
