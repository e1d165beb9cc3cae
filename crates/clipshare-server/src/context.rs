//! Application context.
//!
//! [`AppContext`] is the struct shared across all route handlers via Axum
//! state and handed to background tasks. Everything inside is either an
//! `Arc` or internally shared, so clones are cheap and see the same state.

use std::sync::Arc;

use clipshare_av::{ClipExtractor, WorkDir};
use clipshare_core::config::Config;
use clipshare_core::{Clock, SystemClock};

use crate::registry::ClipRegistry;
use crate::resolver::{LibraryResolver, PathResolver};

/// Application context shared by all request handlers (via Axum state).
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// Live clips.
    pub registry: ClipRegistry,
    /// ffmpeg job runner.
    pub extractor: Arc<ClipExtractor>,
    /// Directory new clips are written to.
    pub work_dir: Arc<WorkDir>,
    /// Time source for every expiry decision.
    pub clock: Arc<dyn Clock>,
    /// Item id -> media path lookup.
    pub resolver: Arc<dyn PathResolver>,
}

impl AppContext {
    /// Build a context with the system clock, an empty registry, and a
    /// resolver over `config.library`.
    pub fn new(config: Config, extractor: ClipExtractor, work_dir: WorkDir) -> Self {
        let resolver = LibraryResolver::new(config.library.clone());
        Self {
            config: Arc::new(config),
            registry: ClipRegistry::new(),
            extractor: Arc::new(extractor),
            work_dir: Arc::new(work_dir),
            clock: Arc::new(SystemClock),
            resolver: Arc::new(resolver),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the item id resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }
}
