//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server, clip lifecycle, tool, and library sections. Every section defaults
//! sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::token::{DEFAULT_TOKEN_BYTES, MAX_TOKEN_BYTES};
use crate::Error;

/// Environment variable naming a host cache directory to try for clip output.
pub const CACHE_DIR_ENV: &str = "CLIPSHARE_CACHE_DIR";

/// Sub-directory created inside each work directory candidate.
const WORK_SUBDIR: &str = "clipshare";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub clips: ClipsConfig,
    pub tools: ToolsConfig,
    /// Static media identifier -> file path table for the default resolver.
    pub library: HashMap<String, PathBuf>,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file, failing if it is missing or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if let Some(ref url) = self.server.public_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                warnings.push(format!(
                    "server.public_base_url '{url}' should start with http:// or https://"
                ));
            }
        }

        if self.clips.default_expire_hours == 0 {
            warnings.push(
                "clips.default_expire_hours is 0; clips expire as soon as they are created"
                    .into(),
            );
        }

        if self.clips.sweep_interval_secs == 0 {
            warnings.push("clips.sweep_interval_secs is 0; using 1 second".into());
        }

        let token_bytes = self.clips.token_bytes;
        if !(DEFAULT_TOKEN_BYTES..=MAX_TOKEN_BYTES).contains(&token_bytes) {
            warnings.push(format!(
                "clips.token_bytes is {token_bytes}; using {} instead",
                token_bytes.clamp(DEFAULT_TOKEN_BYTES, MAX_TOKEN_BYTES)
            ));
        }

        if self.tools.extraction_timeout_secs == 0 {
            warnings.push("tools.extraction_timeout_secs is 0; extractions will time out".into());
        }

        for (id, path) in &self.library {
            if !path.is_absolute() {
                warnings.push(format!("library['{id}'] is not an absolute path"));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally visible base URL for clip links, e.g. `https://media.example.com`.
    /// When unset, links are built from the incoming request's host.
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8096,
            public_base_url: None,
        }
    }
}

/// Clip lifecycle and storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipsConfig {
    /// Lifetime of a clip when the request does not override it.
    pub default_expire_hours: u32,
    /// Period of the background expiration sweep.
    pub sweep_interval_secs: u64,
    /// Explicit output directory; skips candidate probing when set.
    pub work_dir: Option<PathBuf>,
    /// Ordered output directory candidates; empty means the built-in order.
    pub work_dir_candidates: Vec<PathBuf>,
    /// Container extension for generated clips.
    pub output_extension: String,
    /// Random bytes per clip token.
    pub token_bytes: usize,
}

impl Default for ClipsConfig {
    fn default() -> Self {
        Self {
            default_expire_hours: 72,
            sweep_interval_secs: 600,
            work_dir: None,
            work_dir_candidates: Vec::new(),
            output_extension: "mp4".into(),
            token_bytes: DEFAULT_TOKEN_BYTES,
        }
    }
}

impl ClipsConfig {
    /// The ordered list of directories to try for clip output.
    ///
    /// An explicit `work_dir` is the only candidate. Otherwise the configured
    /// candidates are used, or the built-in order: `/tmp/clipshare`, then
    /// `$CLIPSHARE_CACHE_DIR/clipshare`, then the OS temp directory.
    pub fn resolved_candidates(&self) -> Vec<PathBuf> {
        if let Some(ref dir) = self.work_dir {
            return vec![dir.clone()];
        }
        if !self.work_dir_candidates.is_empty() {
            return self.work_dir_candidates.clone();
        }

        let mut candidates = vec![PathBuf::from("/tmp").join(WORK_SUBDIR)];
        if let Some(cache) = std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            candidates.push(PathBuf::from(cache).join(WORK_SUBDIR));
        }
        let os_temp = std::env::temp_dir().join(WORK_SUBDIR);
        if !candidates.contains(&os_temp) {
            candidates.push(os_temp);
        }
        candidates
    }
}

/// External tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    /// Wall-clock ceiling for one extraction before the process is killed.
    pub extraction_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            extraction_timeout_secs: 600,
        }
    }
}
