use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{Result, StorageError};
use crate::store::{Collection, CollectionStore, MemoryStore};

const NEVER: usize = usize::MAX;

/// A [`MemoryStore`] that can be told to fail its next load, or the save
/// after a given number of successful ones. Each armed failure fires once.
#[derive(Debug)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_next_load: AtomicBool,
    saves_before_failure: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_next_load: AtomicBool::new(false),
            saves_before_failure: AtomicUsize::new(NEVER),
        }
    }

    pub fn fail_next_load(&self) {
        self.fail_next_load.store(true, Ordering::SeqCst);
    }

    pub fn fail_save_after(&self, successful_saves: usize) {
        self.saves_before_failure.store(successful_saves, Ordering::SeqCst);
    }
}

fn unavailable() -> StorageError {
    StorageError::Database(sqlx::Error::PoolClosed)
}

impl CollectionStore for FlakyStore {
    async fn load(&self, collection: Collection) -> Result<Option<String>> {
        if self.fail_next_load.swap(false, Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.load(collection).await
    }

    async fn save(&self, collection: Collection, body: String) -> Result<()> {
        match self.saves_before_failure.load(Ordering::SeqCst) {
            NEVER => {}
            0 => {
                self.saves_before_failure.store(NEVER, Ordering::SeqCst);
                return Err(unavailable());
            }
            n => self.saves_before_failure.store(n - 1, Ordering::SeqCst),
        }
        self.inner.save(collection, body).await
    }

    async fn remove(&self, collection: Collection) -> Result<()> {
        self.inner.remove(collection).await
    }
}
