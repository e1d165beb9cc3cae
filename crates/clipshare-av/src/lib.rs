//! # clipshare-av
//!
//! External tool management and clip extraction for clipshare.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the ffmpeg
//!   binary, preferring a configured path.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support that drains output while the process runs.
//! - **Clip extraction** ([`ClipExtractor`]) -- stream-copy a time range of a
//!   media file into a new container.
//! - **Output directory** ([`WorkDir`]) -- pick a writable clip directory
//!   from an ordered candidate list.

pub mod command;
pub mod error;
pub mod extract;
pub mod tools;
pub mod workdir;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use error::{ExtractionError, Result};
pub use extract::{ClipArtifact, ClipExtractor};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workdir::WorkDir;
