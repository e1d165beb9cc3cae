//! Media identifier to file path resolution.
//!
//! Clients that only know a library item id (as the share button injected
//! into a media server page does) send `itemId` instead of a path. The
//! [`PathResolver`] turns that id into a local file.

use std::collections::HashMap;
use std::path::PathBuf;

/// Looks up the media file behind a library item id.
pub trait PathResolver: Send + Sync {
    /// Path of the media file for `media_id`, or `None` if unknown.
    fn resolve(&self, media_id: &str) -> Option<PathBuf>;
}

/// Resolver backed by the static `library` table from the config file.
#[derive(Debug, Clone, Default)]
pub struct LibraryResolver {
    items: HashMap<String, PathBuf>,
}

impl LibraryResolver {
    pub fn new(items: HashMap<String, PathBuf>) -> Self {
        Self { items }
    }
}

impl PathResolver for LibraryResolver {
    fn resolve(&self, media_id: &str) -> Option<PathBuf> {
        self.items.get(media_id.trim()).cloned()
    }
}
