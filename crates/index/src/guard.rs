//! Mutual exclusion between rebuilds and snapshot reads.
//!
//! Every rebuild holds the lease from the moment it starts loading
//! documents until the new snapshot has been renamed into place. Queries
//! hold it only while reading the snapshot file.
//!
//! The lease is two locks taken in order: an in-process mutex, so tasks of
//! one manager queue without tying up blocking threads, then an exclusive OS
//! lock on `<persist_dir>/.lock`, so separate processes (`courier serve`
//! next to a one-shot `courier build`) exclude each other too.

use crate::config::LOCK_FILE;
use courier_core::{AppError, AppResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared handle to the index lock of one persist directory.
#[derive(Debug, Clone)]
pub struct IndexGuard {
    local: Arc<Mutex<()>>,
    lock_path: PathBuf,
}

/// Proof of exclusive access; released when dropped.
#[derive(Debug)]
pub struct IndexLease {
    file: File,
    _local: OwnedMutexGuard<()>,
    purpose: &'static str,
    started: Instant,
    acquired_at: SystemTime,
}

impl IndexGuard {
    /// Guard for the index persisted in `persist_dir`.
    pub fn new(persist_dir: impl AsRef<Path>) -> Self {
        Self {
            local: Arc::new(Mutex::new(())),
            lock_path: persist_dir.as_ref().join(LOCK_FILE),
        }
    }

    /// Wait until both locks are free and take them.
    pub async fn acquire(&self, purpose: &'static str) -> AppResult<IndexLease> {
        let started = Instant::now();
        let local = Arc::clone(&self.local).lock_owned().await;

        let path = self.lock_path.clone();
        let file = tokio::task::spawn_blocking(move || {
            let file = open_lock_file(&path)?;
            file.lock_exclusive()
                .map_err(|e| AppError::Lock(format!("Failed to lock {:?}: {}", path, e)))?;
            Ok::<_, AppError>(file)
        })
        .await
        .map_err(|e| AppError::Lock(format!("Lock task failed: {}", e)))??;

        tracing::debug!(
            purpose,
            waited_ms = started.elapsed().as_millis() as u64,
            "Index lease acquired"
        );

        Ok(IndexLease::new(file, local, purpose))
    }

    /// Take the lease only if no task or process holds it.
    pub fn try_acquire(&self, purpose: &'static str) -> AppResult<Option<IndexLease>> {
        let Ok(local) = Arc::clone(&self.local).try_lock_owned() else {
            return Ok(None);
        };

        let file = open_lock_file(&self.lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(purpose, "Index lease acquired without waiting");
                Ok(Some(IndexLease::new(file, local, purpose)))
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(AppError::Lock(format!(
                "Failed to lock {:?}: {}",
                self.lock_path, e
            ))),
        }
    }

    /// Whether a task in this process currently holds the lease.
    pub fn is_held(&self) -> bool {
        self.local.try_lock().is_err()
    }
}

fn open_lock_file(path: &Path) -> AppResult<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::Lock(format!("Failed to create {:?}: {}", dir, e)))?;
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| AppError::Lock(format!("Failed to open {:?}: {}", path, e)))
}

impl IndexLease {
    fn new(file: File, local: OwnedMutexGuard<()>, purpose: &'static str) -> Self {
        Self {
            file,
            _local: local,
            purpose,
            started: Instant::now(),
            acquired_at: SystemTime::now(),
        }
    }

    pub fn purpose(&self) -> &'static str {
        self.purpose
    }

    /// Wall-clock time the lease was granted.
    pub fn acquired_at(&self) -> SystemTime {
        self.acquired_at
    }
}

impl Drop for IndexLease {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release index lock: {}", e);
        }

        tracing::debug!(
            purpose = self.purpose,
            held_ms = self.started.elapsed().as_millis() as u64,
            "Index lease released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lease_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let guard = IndexGuard::new(temp.path());
        let lease = guard.acquire("build").await.unwrap();

        assert!(guard.is_held());
        assert!(guard.try_acquire("query").unwrap().is_none());
        assert_eq!(lease.purpose(), "build");

        drop(lease);
        assert!(!guard.is_held());
        assert!(guard.try_acquire("query").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_released_on_early_return() {
        async fn failing(guard: &IndexGuard) -> Result<(), String> {
            let _lease = guard.acquire("build").await.map_err(|e| e.to_string())?;
            let step: Result<(), String> = Err("boom".to_string());
            step?;
            Ok(())
        }

        let temp = TempDir::new().unwrap();
        let guard = IndexGuard::new(temp.path());
        assert!(failing(&guard).await.is_err());
        assert!(!guard.is_held());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waiter_proceeds_after_release() {
        let temp = TempDir::new().unwrap();
        let guard = IndexGuard::new(temp.path());
        let lease = guard.acquire("build").await.unwrap();

        let waiter = {
            let guard = guard.clone();
            tokio::spawn(async move {
                let lease = guard.acquire("query").await.unwrap();
                lease.purpose()
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(lease);
        assert_eq!(waiter.await.unwrap(), "query");
    }

    #[test]
    fn test_clones_share_the_lock() {
        let temp = TempDir::new().unwrap();
        let guard = IndexGuard::new(temp.path());
        let other = guard.clone();

        let _lease = guard.try_acquire("build").unwrap().unwrap();
        assert!(other.try_acquire("query").unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_independent_guards_on_one_directory_exclude_each_other() {
        let temp = TempDir::new().unwrap();
        let serve = IndexGuard::new(temp.path());
        let oneshot = IndexGuard::new(temp.path());

        let lease = serve.acquire("build").await.unwrap();
        assert!(!oneshot.is_held());
        assert!(oneshot.try_acquire("build").unwrap().is_none());

        let waiter = tokio::spawn(async move {
            let lease = oneshot.acquire("build").await.unwrap();
            lease.acquired_at()
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        let released = SystemTime::now();
        drop(lease);
        assert!(waiter.await.unwrap() >= released);
        assert!(temp.path().join(LOCK_FILE).is_file());
    }
}
