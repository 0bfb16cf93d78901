// SYNOID Temp File Janitor
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Tracks every scratch file a job creates and removes them all when the
// job ends, whichever way it ends. A dropped janitor (cancelled request)
// still cleans up, synchronously, from Drop.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct TempFileJanitor {
    paths: Vec<PathBuf>,
    done: bool,
}

impl TempFileJanitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a path. Call this before the file is created.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every tracked path that still exists.
    ///
    /// A failure on one path is logged and the rest are still attempted.
    /// Returns the number of files actually removed.
    pub async fn cleanup(mut self) -> usize {
        self.done = true;
        let mut removed = 0;
        for path in std::mem::take(&mut self.paths) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("[JANITOR] Could not remove {:?}: {}", path, e),
            }
        }
        debug!("[JANITOR] Removed {} temp files", removed);
        removed
    }
}

fn remove_now(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("[JANITOR] Could not remove {:?}: {}", path, e),
    }
}

impl Drop for TempFileJanitor {
    fn drop(&mut self) {
        if self.done || self.paths.is_empty() {
            return;
        }
        warn!(
            "[JANITOR] Job abandoned, removing {} temp files",
            self.paths.len()
        );
        for path in &self.paths {
            remove_now(path);
        }
    }
}
