//! In-memory clip registry.
//!
//! Maps clip tokens to their [`ClipRecord`]s. The registry is created once at
//! startup and shared through [`crate::context::AppContext`]; it is not
//! persisted, so a restart forgets every clip.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use clipshare_core::{ClipRecord, ClipToken, Error, Result};

/// Thread-safe token -> clip mapping.
#[derive(Debug, Clone, Default)]
pub struct ClipRegistry {
    clips: Arc<DashMap<ClipToken, ClipRecord>>,
}

impl ClipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip under its token.
    ///
    /// Fails with [`Error::Conflict`] if the token is already present; an
    /// existing record is never overwritten.
    pub fn insert(&self, record: ClipRecord) -> Result<()> {
        match self.clips.entry(record.token.clone()) {
            Entry::Occupied(_) => Err(Error::Conflict(format!(
                "clip token {} is already registered",
                record.token
            ))),
            Entry::Vacant(slot) => {
                tracing::debug!(token = %record.token, expires_at = %record.expires_at, "Clip registered");
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Copy of the record for `token`, if registered.
    pub fn lookup(&self, token: &ClipToken) -> Option<ClipRecord> {
        self.clips.get(token).map(|r| r.value().clone())
    }

    /// Remove `token`. Returns `false` if it was not registered.
    pub fn remove(&self, token: &ClipToken) -> bool {
        self.clips.remove(token).is_some()
    }

    /// Point-in-time copy of every record.
    pub fn snapshot(&self) -> Vec<ClipRecord> {
        self.clips.iter().map(|r| r.value().clone()).collect()
    }

    /// Remove and return the record for `token` only if it is expired at
    /// `now`. The check and the removal happen under the same shard lock, so
    /// of several concurrent callers at most one gets the record.
    pub fn take_if_expired(&self, token: &ClipToken, now: DateTime<Utc>) -> Option<ClipRecord> {
        self.clips
            .remove_if(token, |_, record| record.is_expired(now))
            .map(|(_, record)| record)
    }

    /// Number of registered clips.
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// Whether no clips are registered.
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}
