//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which builds a full [`AppContext`] around a
//! manual clock, a temporary clip directory, and a shell script standing in
//! for ffmpeg. [`TestHarness::with_server`] starts Axum on a random port for
//! HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use clipshare_av::{ClipExtractor, WorkDir};
use clipshare_core::config::Config;
use clipshare_core::ManualClock;
use clipshare_server::context::AppContext;
use clipshare_server::router::build_router;

/// Fake ffmpeg that copies its input (argument 10) into its output (last
/// argument), logging every invocation.
pub const COPY_SCRIPT: &str = r#"shift 9
input="$1"
for last; do :; done
cat "$input" > "$last""#;

/// Fake ffmpeg that fails the way a corrupt input does.
pub const FAIL_SCRIPT: &str = r#"echo "[mov,mp4] moov atom not found" >&2
echo "Invalid data found when processing input" >&2
exit 1"#;

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub clock: Arc<ManualClock>,
    /// Clip output directory.
    pub work_dir: TempDir,
    /// Source media files live here.
    pub media_dir: TempDir,
    /// Holds the fake ffmpeg and its invocation log.
    pub bin_dir: TempDir,
}

impl TestHarness {
    /// Harness with default configuration and a working fake ffmpeg.
    pub fn new() -> Self {
        Self::build(Config::default(), COPY_SCRIPT)
    }

    /// Harness with a custom configuration and fake ffmpeg body.
    pub fn build(config: Config, ffmpeg_body: &str) -> Self {
        let work_dir = tempfile::tempdir().expect("failed to create work dir");
        let media_dir = tempfile::tempdir().expect("failed to create media dir");
        let bin_dir = tempfile::tempdir().expect("failed to create bin dir");

        let ffmpeg = bin_dir.path().join("ffmpeg");
        let log = bin_dir.path().join("invocations.log");
        let script = format!(
            "#!/bin/sh\necho \"$*\" >> '{}'\n{ffmpeg_body}\n",
            log.display()
        );
        std::fs::write(&ffmpeg, script).expect("failed to write fake ffmpeg");
        std::fs::set_permissions(&ffmpeg, std::fs::Permissions::from_mode(0o755))
            .expect("failed to chmod fake ffmpeg");

        let clock = Arc::new(ManualClock::default());
        let ctx = AppContext::new(
            config,
            ClipExtractor::new(ffmpeg, Duration::from_secs(30)),
            WorkDir::new(work_dir.path()),
        )
        .with_clock(clock.clone());

        Self {
            ctx,
            clock,
            work_dir,
            media_dir,
            bin_dir,
        }
    }

    /// Default harness plus a running server.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let addr = harness.serve().await;
        (harness, addr)
    }

    /// Start an Axum server for the current context on a random port.
    pub async fn serve(&self) -> SocketAddr {
        let app = build_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        addr
    }

    /// Write a source media file of `len` patterned bytes.
    pub fn media_file(&self, name: &str, len: usize) -> PathBuf {
        let path = self.media_dir.path().join(name);
        std::fs::write(&path, patterned_bytes(len)).expect("failed to write media file");
        path
    }

    /// How many times the fake ffmpeg has been started.
    pub fn ffmpeg_runs(&self) -> usize {
        std::fs::read_to_string(self.bin_dir.path().join("invocations.log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    /// Files currently in the clip directory.
    pub fn clip_files(&self) -> Vec<PathBuf> {
        list_files(self.work_dir.path())
    }
}

/// Deterministic, non-repeating-looking content so ranges are checkable.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}
