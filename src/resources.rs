use log::warn;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;

// Monotonic per-process counter so artifact names never collide with a prior
// run's leftovers, even after a failed cleanup.
static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

/// RAII wrapper for temporary artifacts that ensures cleanup on drop
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl TempArtifact {
    /// Wrap an existing path
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cleanup_on_drop: true,
        }
    }

    /// Reserve a unique intermediate artifact path for a pipeline pass.
    ///
    /// The file itself is created by the engine; only the name is reserved
    /// here. Keeps the source container extension so the intermediate stays
    /// in a format the next pass accepts.
    pub fn for_pass(source: &Path, pass_index: usize) -> Self {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("video");
        let ext = source
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("mkv");
        let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::SeqCst);
        let filename = format!(
            "vidscrub_{}_pass{}_{}_{}.{}",
            stem,
            pass_index,
            std::process::id(),
            seq,
            ext
        );
        Self::new(std::env::temp_dir().join(filename))
    }

    /// Get the path to the artifact
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take ownership of the path and disable cleanup
    pub fn take_path(mut self) -> PathBuf {
        self.cleanup_on_drop = false;
        self.path.clone()
    }

    /// Manually cleanup the file (consumes self)
    pub fn cleanup(mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| crate::error::artifact_error(e, self.path.clone()))?;
        }
        self.cleanup_on_drop = false;
        Ok(())
    }

    /// Check if the file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to cleanup temporary artifact {:?}: {}", self.path, e);
            }
        }
    }
}
