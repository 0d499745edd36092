//! Per-document run serialization
//!
//! Each path gets a lock while someone holds or waits for it. The entry is
//! dropped with the last guard, so the map only holds documents that are
//! being dry-run right now.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type DocumentLock = Arc<AsyncMutex<()>>;

/// Locks keyed by document path, shareable across orchestrators
#[derive(Debug, Default)]
pub struct DocumentLocks {
    locks: Mutex<HashMap<PathBuf, DocumentLock>>,
}

/// Held for the duration of one run; releases the path's entry on drop
#[derive(Debug)]
pub struct DocumentGuard<'a> {
    locks: &'a DocumentLocks,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other run holds `path`
    pub async fn acquire(&self, path: &Path) -> DocumentGuard<'_> {
        let lock = Arc::clone(self.map().entry(path.to_path_buf()).or_default());

        DocumentGuard {
            locks: self,
            path: path.to_path_buf(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of documents currently held or waited for
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The map is only touched between awaits, so a std mutex is enough
    fn map(&self) -> MutexGuard<'_, HashMap<PathBuf, DocumentLock>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DocumentGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Waiters hold their own clone of the lock, so a count of one means
        // only the map is left
        let mut locks = self.locks.map();
        if locks
            .get(&self.path)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn entry_is_removed_after_release() {
        let locks = DocumentLocks::new();

        let guard = locks.acquire(Path::new("/w/definitions/orders.sqlx")).await;
        assert_eq!(locks.len(), 1);

        drop(guard);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn entry_survives_while_someone_waits() {
        let locks = Arc::new(DocumentLocks::new());
        let path = Path::new("/w/definitions/orders.sqlx");

        let first = locks.acquire(path).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _second = locks.acquire(Path::new("/w/definitions/orders.sqlx")).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        assert_eq!(locks.len(), 1);

        drop(first);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn distinct_paths_do_not_block() {
        let locks = DocumentLocks::new();

        let _orders = locks.acquire(Path::new("/w/orders.sqlx")).await;
        let _customers = locks.acquire(Path::new("/w/customers.sqlx")).await;

        assert_eq!(locks.len(), 2);
    }
}
