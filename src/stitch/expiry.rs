// SYNOID Expiry Registry & Sweeper
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Locally published videos live for a fixed TTL. The registry is the only
// authority on whether a file may be served: no entry means not found, an
// expired entry means gone. Expired files are reaped lazily on access and
// eagerly by the sweeper, whichever comes first.
//
// The table is process memory only. Files left behind by a previous process
// are removed by `purge_orphans` at startup.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

pub const PUBLISHED_PREFIX: &str = "video-";
pub const PUBLISHED_EXTENSION: &str = "mp4";

/// Outcome of looking up a published file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Servable(PathBuf),
    Gone,
    NotFound,
}

pub struct ExpiryRegistry {
    dir: PathBuf,
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

/// A bare file name with no directory parts.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

async fn delete_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("[EXPIRY] Could not delete {:?}: {}", path, e),
    }
}

impl ExpiryRegistry {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        // Critical sections are single map operations, so a poisoned map is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, file_name: &str, expires_at: DateTime<Utc>) {
        self.entries().insert(file_name.to_string(), expires_at);
        debug!("[EXPIRY] Registered {} until {}", file_name, expires_at);
    }

    pub fn expires_at(&self, file_name: &str) -> Option<DateTime<Utc>> {
        self.entries().get(file_name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decide whether `file_name` may be served at `now`.
    ///
    /// Servable while `now <= expires_at`. Past that the file and the entry
    /// are both deleted and the answer is `Gone`.
    pub async fn access(&self, file_name: &str, now: DateTime<Utc>) -> Access {
        if !is_plain_file_name(file_name) {
            return Access::NotFound;
        }

        let path = self.dir.join(file_name);
        let expired = {
            let mut entries = self.entries();
            match entries.get(file_name).copied() {
                None => return Access::NotFound,
                Some(expires_at) if now > expires_at => {
                    entries.remove(file_name);
                    true
                }
                Some(_) => false,
            }
        };

        if expired {
            delete_file(&path).await;
            info!("[EXPIRY] {} requested after expiry, deleted", file_name);
            return Access::Gone;
        }

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            Access::Servable(path)
        } else {
            warn!("[EXPIRY] {} registered but missing on disk", file_name);
            self.entries().remove(file_name);
            Access::NotFound
        }
    }

    /// Remove every entry past expiry, and its file. Returns the reaped names.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = {
            let mut entries = self.entries();
            let names: Vec<String> = entries
                .iter()
                .filter(|(_, expires_at)| now > **expires_at)
                .map(|(name, _)| name.clone())
                .collect();
            for name in &names {
                entries.remove(name);
            }
            names
        };

        for name in &expired {
            delete_file(&self.dir.join(name)).await;
            info!("[EXPIRY] Expired file deleted: {}", name);
        }
        expired
    }

    /// Delete published-looking files in the serving directory that have no
    /// entry. Run once at startup, before anything is published.
    pub async fn purge_orphans(&self) -> std::io::Result<usize> {
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        let mut purged = 0;

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let ours = name.starts_with(PUBLISHED_PREFIX)
                && name.ends_with(&format!(".{}", PUBLISHED_EXTENSION));
            if !ours || self.expires_at(&name).is_some() {
                continue;
            }
            if entry.file_type().await?.is_file() {
                delete_file(&entry.path()).await;
                purged += 1;
            }
        }

        if purged > 0 {
            info!("[EXPIRY] Purged {} orphaned files from {:?}", purged, self.dir);
        }
        Ok(purged)
    }
}

/// Background task that sweeps the registry on a fixed interval.
pub struct ExpirySweeper {
    is_running: Arc<AtomicBool>,
    sweep_count: Arc<AtomicU64>,
    wake: Arc<Notify>,
}

impl ExpirySweeper {
    /// Start sweeping. The first sweep happens one interval from now.
    pub fn start(registry: Arc<ExpiryRegistry>, interval: Duration) -> Self {
        let is_running = Arc::new(AtomicBool::new(true));
        let sweep_count = Arc::new(AtomicU64::new(0));
        let wake = Arc::new(Notify::new());

        let running = is_running.clone();
        let count = sweep_count.clone();
        let stop = wake.clone();

        tokio::spawn(async move {
            info!("[EXPIRY] Sweeper started (interval: {:?})", interval);
            while running.load(Ordering::Relaxed) {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop.notified() => break,
                }
                let reaped = registry.sweep(Utc::now()).await;
                let n = count.fetch_add(1, Ordering::Relaxed) + 1;
                if !reaped.is_empty() {
                    info!("[EXPIRY] Sweep #{} reaped {} files", n, reaped.len());
                }
            }
            info!("[EXPIRY] Sweeper stopped.");
        });

        Self {
            is_running,
            sweep_count,
            wake,
        }
    }

    pub fn sweep_count(&self) -> u64 {
        self.sweep_count.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.is_running.store(false, Ordering::Relaxed);
        self.wake.notify_one();
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn published(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"mp4").unwrap();
        path
    }

    #[tokio::test]
    async fn test_unknown_name_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ExpiryRegistry::new(dir.path().to_path_buf());
        assert_eq!(registry.access("x.mp4", Utc::now()).await, Access::NotFound);
    }

    #[tokio::test]
    async fn test_file_without_entry_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        published(dir.path(), "x.mp4");
        let registry = ExpiryRegistry::new(dir.path().to_path_buf());
        assert_eq!(registry.access("x.mp4", Utc::now()).await, Access::NotFound);
    }

    #[tokio::test]
    async fn test_servable_up_to_and_including_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let path = published(dir.path(), "video-1.mp4");
        let registry = ExpiryRegistry::new(dir.path().to_path_buf());
        let expires_at = Utc::now() + ChronoDuration::minutes(30);
        registry.register("video-1.mp4", expires_at);

        assert_eq!(
            registry.access("video-1.mp4", Utc::now()).await,
            Access::Servable(path.clone())
        );
        assert_eq!(
            registry.access("video-1.mp4", expires_at).await,
            Access::Servable(path)
        );
    }

    #[tokio::test]
    async fn test_expired_access_deletes_file_and_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = published(dir.path(), "video-2.mp4");
        let registry = ExpiryRegistry::new(dir.path().to_path_buf());
        let now = Utc::now();
        registry.register("video-2.mp4", now - ChronoDuration::milliseconds(1));

        assert_eq!(registry.access("video-2.mp4", now).await, Access::Gone);
        assert!(!path.exists());
        assert!(registry.expires_at("video-2.mp4").is_none());
        // Second fetch: the entry is gone too.
        assert_eq!(registry.access("video-2.mp4", now).await, Access::NotFound);
    }

    #[tokio::test]
    async fn test_entry_without_file_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ExpiryRegistry::new(dir.path().to_path_buf());
        registry.register("video-3.mp4", Utc::now() + ChronoDuration::minutes(5));

        assert_eq!(registry.access("video-3.mp4", Utc::now()).await, Access::NotFound);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_traversal_names_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ExpiryRegistry::new(dir.path().to_path_buf());
        registry.register("../secret.mp4", Utc::now() + ChronoDuration::minutes(5));

        assert_eq!(registry.access("../secret.mp4", Utc::now()).await, Access::NotFound);
        assert_eq!(registry.access("a/b.mp4", Utc::now()).await, Access::NotFound);
        assert_eq!(registry.access("..", Utc::now()).await, Access::NotFound);
        assert_eq!(registry.access("", Utc::now()).await, Access::NotFound);
    }

    #[tokio::test]
    async fn test_sweep_reaps_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let old = published(dir.path(), "video-old.mp4");
        let fresh = published(dir.path(), "video-fresh.mp4");
        let registry = ExpiryRegistry::new(dir.path().to_path_buf());
        let now = Utc::now();
        registry.register("video-old.mp4", now - ChronoDuration::seconds(1));
        registry.register("video-fresh.mp4", now + ChronoDuration::minutes(10));

        let reaped = registry.sweep(now).await;

        assert_eq!(reaped, vec!["video-old.mp4".to_string()]);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_purge_orphans_keeps_registered_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let orphan = published(dir.path(), "video-orphan.mp4");
        let live = published(dir.path(), "video-live.mp4");
        let foreign = published(dir.path(), "notes.txt");
        let registry = ExpiryRegistry::new(dir.path().to_path_buf());
        registry.register("video-live.mp4", Utc::now() + ChronoDuration::minutes(1));

        assert_eq!(registry.purge_orphans().await.unwrap(), 1);
        assert!(!orphan.exists());
        assert!(live.exists());
        assert!(foreign.exists());
    }

    #[tokio::test]
    async fn test_sweeper_reaps_without_any_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = published(dir.path(), "video-idle.mp4");
        let registry = Arc::new(ExpiryRegistry::new(dir.path().to_path_buf()));
        registry.register("video-idle.mp4", Utc::now() - ChronoDuration::seconds(1));

        let sweeper = ExpirySweeper::start(registry.clone(), Duration::from_millis(20));
        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        sweeper.stop();

        assert!(!path.exists());
        assert!(registry.is_empty());
        assert!(sweeper.sweep_count() >= 1);
        assert!(!sweeper.is_running());
    }
}
