//! Clip output directory selection.
//!
//! Generated clips land in a single flat directory chosen at startup from an
//! ordered list of candidates: the first one that can be created and written
//! wins.

use std::path::{Path, PathBuf};

use clipshare_core::{ClipToken, Error, Result};

/// The directory generated clips are written to.
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Use `root` without probing. Intended for callers that already know the
    /// directory is usable.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Pick the first candidate that can be created and written to.
    pub fn resolve(candidates: &[PathBuf]) -> Result<Self> {
        for candidate in candidates {
            match probe(candidate) {
                Ok(()) => {
                    tracing::info!("Using clip directory {}", candidate.display());
                    return Ok(Self::new(candidate.clone()));
                }
                Err(e) => {
                    tracing::warn!(
                        "Clip directory candidate {} is not usable: {e}",
                        candidate.display()
                    );
                }
            }
        }

        Err(Error::Internal(format!(
            "no writable clip directory among {} candidate(s)",
            candidates.len()
        )))
    }

    /// The directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-check that the directory still exists and accepts writes.
    ///
    /// Recreates the directory if something removed it since startup.
    pub fn ensure_writable(&self) -> Result<()> {
        probe(&self.root).map_err(Error::from)
    }

    /// Output path for a clip: `<root>/<token>.<extension>`.
    pub fn clip_path(&self, token: &ClipToken, extension: &str) -> PathBuf {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            self.root.join(token.as_str())
        } else {
            self.root.join(format!("{token}.{extension}"))
        }
    }
}

/// Create `dir` if needed and prove it is writable with a throwaway file.
fn probe(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    // Dropping the handle deletes the probe file.
    let probe = tempfile::Builder::new()
        .prefix(".probe-")
        .tempfile_in(dir)?;
    drop(probe);
    Ok(())
}
