//! Expired clip reclamation.
//!
//! Reclaiming a clip takes its entry out of the registry first and deletes
//! the backing file second. Only the caller that wins the removal touches the
//! file, so the periodic sweep and lazy expiry on access never fight over
//! the same clip.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use clipshare_core::{ClipToken, Clock};

use crate::registry::ClipRegistry;

/// Result of reclaiming one clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaim {
    /// The clip was absent or not yet expired; nothing happened.
    Skipped,
    /// Entry removed and file gone.
    Reclaimed,
    /// Entry removed but the file could not be deleted.
    DeleteFailed,
}

/// Counters for one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub reclaimed: usize,
    pub failed: usize,
}

/// Reclaim `token` if it is expired at `now`.
pub fn reclaim_if_expired(registry: &ClipRegistry, token: &ClipToken, now: DateTime<Utc>) -> Reclaim {
    let Some(record) = registry.take_if_expired(token, now) else {
        return Reclaim::Skipped;
    };

    match delete_artifact(&record.output_path) {
        Ok(()) => {
            tracing::info!(
                token = %record.token,
                path = %record.output_path.display(),
                expired_at = %record.expires_at,
                "Expired clip reclaimed"
            );
            Reclaim::Reclaimed
        }
        Err(e) => {
            tracing::warn!(
                token = %record.token,
                path = %record.output_path.display(),
                "Failed to delete expired clip file: {e}"
            );
            Reclaim::DeleteFailed
        }
    }
}

/// One sweep over a snapshot of the registry.
pub fn sweep_once(registry: &ClipRegistry, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();

    for record in registry.snapshot() {
        report.scanned += 1;
        if !record.is_expired(now) {
            continue;
        }
        match reclaim_if_expired(registry, &record.token, now) {
            Reclaim::Reclaimed => report.reclaimed += 1,
            Reclaim::DeleteFailed => report.failed += 1,
            Reclaim::Skipped => {}
        }
    }

    if report.reclaimed > 0 || report.failed > 0 {
        tracing::info!(
            scanned = report.scanned,
            reclaimed = report.reclaimed,
            failed = report.failed,
            "Clip sweep finished"
        );
    } else {
        tracing::debug!(scanned = report.scanned, "Clip sweep found nothing to reclaim");
    }

    report
}

/// Run [`sweep_once`] every `period` until `cancel` fires.
///
/// The first tick fires immediately. Missed ticks are skipped rather than
/// bunched up.
pub async fn run_sweeper(
    registry: ClipRegistry,
    clock: Arc<dyn Clock>,
    period: Duration,
    cancel: CancellationToken,
) {
    let period = period.max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(period_secs = period.as_secs(), "Clip sweeper started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let registry = registry.clone();
                let now = clock.now();
                // File deletion is blocking I/O.
                let pass = tokio::task::spawn_blocking(move || sweep_once(&registry, now)).await;
                if let Err(e) = pass {
                    tracing::error!("Clip sweep task failed: {e}");
                }
            }
        }
    }

    tracing::info!("Clip sweeper stopped");
}

/// Delete a clip file. A file that is already gone counts as deleted.
fn delete_artifact(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
