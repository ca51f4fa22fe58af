//! Shared Store
//!
//! A cloneable handle that serializes access to one [`Store`] behind a
//! single mutex, for callers that need to use a store from several threads.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::store::Store;

/// Thread-safe handle to a store
///
/// Every call takes the lock for its whole duration, so operations never
/// interleave. Streaming reads go through [`SharedStore::with`] so the
/// reader cannot outlive the lock.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Store>>,
}

impl SharedStore {
    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.inner.lock().contains(key)
    }

    pub fn load(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.inner.lock().load(key)
    }

    pub fn upsert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.lock().upsert(key, value)
    }

    pub fn remove(&self, key: &[u8]) -> Result<bool> {
        self.inner.lock().remove(key)
    }

    pub fn close(&self) -> Result<()> {
        self.inner.lock().close()
    }

    /// Run `f` with exclusive access to the store
    pub fn with<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        let mut store = self.inner.lock();
        f(&mut store)
    }
}

impl From<Store> for SharedStore {
    fn from(store: Store) -> Self {
        Self::new(store)
    }
}
