//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the location of ffmpeg and
//! provides lookup methods for the rest of the crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &["ffmpeg"];

/// Media servers commonly ship their own ffmpeg build here.
const BUNDLED_FFMPEG: &str = "/usr/lib/jellyfin-ffmpeg/ffmpeg";

/// Configuration for a single external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
    /// Maximum execution time before the tool is killed.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

/// Serde helpers to (de)serialize `Duration` as whole seconds.
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools, preferring configured paths.
    ///
    /// For ffmpeg the order is: the configured `ffmpeg_path` if it exists,
    /// then the bundled media-server build, then `PATH` via [`which::which`].
    /// Tools that are not found are omitted from the registry.
    pub fn discover(tools_config: &clipshare_core::config::ToolsConfig) -> Self {
        let timeout = Duration::from_secs(tools_config.extraction_timeout_secs);
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                _ => None,
            };

            if let Some(p) = custom_path {
                if !p.exists() {
                    tracing::warn!(
                        "Configured {name} path {} does not exist; searching elsewhere",
                        p.display()
                    );
                }
            }

            let resolved = custom_path
                .filter(|p| p.exists())
                .map(Path::to_path_buf)
                .or_else(|| bundled_path(name))
                .or_else(|| which::which(name).ok());

            if let Some(path) = resolved {
                tools.insert(
                    name.to_string(),
                    ToolConfig {
                        name: name.to_string(),
                        path,
                        timeout,
                    },
                );
            }
        }

        Self { tools }
    }

    /// Return a reference to the [`ToolConfig`] for the given tool, or an
    /// [`clipshare_core::Error::Tool`] if the tool was not found during discovery.
    pub fn require(&self, name: &str) -> clipshare_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            clipshare_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Path to ffmpeg, or the bare name when discovery failed.
    ///
    /// A bare name makes a missing binary surface as a spawn failure at
    /// extraction time instead of preventing startup.
    pub fn ffmpeg_path(&self) -> PathBuf {
        self.tools
            .get("ffmpeg")
            .map(|cfg| cfg.path.clone())
            .unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| {
                if let Some(cfg) = self.tools.get(name) {
                    ToolInfo {
                        name: name.to_string(),
                        available: true,
                        version: detect_version(&cfg.path),
                        path: Some(cfg.path.clone()),
                    }
                } else {
                    ToolInfo {
                        name: name.to_string(),
                        available: false,
                        version: None,
                        path: None,
                    }
                }
            })
            .collect()
    }
}

fn bundled_path(name: &str) -> Option<PathBuf> {
    let candidate = match name {
        "ffmpeg" => Path::new(BUNDLED_FFMPEG),
        _ => return None,
    };
    candidate.exists().then(|| candidate.to_path_buf())
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
