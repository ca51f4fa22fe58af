//! Index Manager
//!
//! In-memory key → block list directory, persisted to the `index` file.
//!
//! The directory is loaded once in full when the manager opens and written
//! back once on close. A key mapped to an empty block list holds a
//! zero-length value, which is distinct from the key being absent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{BlockKvError, Result};

use super::codec;
use super::{BlockLocation, Key, INDEX_FILE_NAME};

/// Owns the key directory
pub struct IndexManager {
    /// Where the directory is persisted
    index_path: PathBuf,

    /// Key → blocks in write order. `None` once closed.
    entries: Option<HashMap<Key, Vec<BlockLocation>>>,
}

impl IndexManager {
    /// Open the index in `data_dir`, loading it if a persisted file exists
    pub fn open(data_dir: &Path) -> Result<Self> {
        let index_path = data_dir.join(INDEX_FILE_NAME);
        let entries = codec::load_if_exists(&index_path, codec::read_index)?.unwrap_or_default();

        debug!(entries = entries.len(), "Index loaded");

        Ok(Self {
            index_path,
            entries: Some(entries),
        })
    }

    /// Map `key` to `blocks`, replacing any previous mapping
    pub fn put(&mut self, key: impl Into<Key>, blocks: Vec<BlockLocation>) -> Result<()> {
        self.entries_mut()?.insert(key.into(), blocks);
        Ok(())
    }

    /// Drop the mapping for `key`, returning its blocks if it was present
    pub fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<BlockLocation>>> {
        Ok(self.entries_mut()?.remove(key))
    }

    /// Blocks for `key`; `None` if absent, `Some(&[])` for an empty value
    pub fn lookup(&self, key: &[u8]) -> Result<Option<&[BlockLocation]>> {
        Ok(self.entries()?.get(key).map(Vec::as_slice))
    }

    /// Number of keys
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries()?.is_empty())
    }

    /// Iterate over all stored keys in no particular order
    pub fn keys(&self) -> Result<impl Iterator<Item = &Key>> {
        Ok(self.entries()?.keys())
    }

    /// Persist the directory; later calls do nothing
    pub fn close(&mut self) -> Result<()> {
        let Some(entries) = self.entries.as_ref() else {
            return Ok(());
        };

        codec::save_atomic(&self.index_path, |w| codec::write_index(w, entries))?;
        debug!(entries = entries.len(), "Index persisted");

        self.entries = None;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.entries.is_none()
    }

    fn entries(&self) -> Result<&HashMap<Key, Vec<BlockLocation>>> {
        self.entries.as_ref().ok_or(BlockKvError::Closed)
    }

    fn entries_mut(&mut self) -> Result<&mut HashMap<Key, Vec<BlockLocation>>> {
        self.entries.as_mut().ok_or(BlockKvError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn block(offset: u32, size: u32) -> BlockLocation {
        BlockLocation::new("file", offset, size)
    }

    #[test]
    fn test_absent_vs_empty() {
        let temp = TempDir::new().unwrap();
        let mut index = IndexManager::open(temp.path()).unwrap();

        index.put(&b"empty"[..], Vec::new()).unwrap();

        assert_eq!(index.lookup(b"empty").unwrap(), Some(&[][..]));
        assert_eq!(index.lookup(b"missing").unwrap(), None);
    }

    #[test]
    fn test_put_last_write_wins() {
        let temp = TempDir::new().unwrap();
        let mut index = IndexManager::open(temp.path()).unwrap();

        index.put(&b"k"[..], vec![block(0, 1)]).unwrap();
        index.put(&b"k"[..], vec![block(4, 2), block(8, 1)]).unwrap();

        assert_eq!(index.len().unwrap(), 1);
        assert_eq!(
            index.lookup(b"k").unwrap().unwrap(),
            &[block(4, 2), block(8, 1)]
        );
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut index = IndexManager::open(temp.path()).unwrap();
        index.put(&b"a"[..], vec![block(0, 1)]).unwrap();

        assert_eq!(index.remove(b"b").unwrap(), None);
        assert_eq!(index.len().unwrap(), 1);
        assert_eq!(index.remove(b"a").unwrap(), Some(vec![block(0, 1)]));
        assert!(index.is_empty().unwrap());
    }

    #[test]
    fn test_keys_compare_by_content() {
        let temp = TempDir::new().unwrap();
        let mut index = IndexManager::open(temp.path()).unwrap();

        let original = vec![1u8, 2, 3];
        index.put(original.clone(), vec![block(0, 3)]).unwrap();

        let probe = [1u8, 2, 3];
        assert!(index.lookup(&probe).unwrap().is_some());
    }

    #[test]
    fn test_close_and_reload() {
        let temp = TempDir::new().unwrap();
        {
            let mut index = IndexManager::open(temp.path()).unwrap();
            index.put(&b"a"[..], vec![block(0, 2)]).unwrap();
            index.put(&b"b"[..], Vec::new()).unwrap();
            index.close().unwrap();
        }

        let index = IndexManager::open(temp.path()).unwrap();
        assert_eq!(index.len().unwrap(), 2);
        assert_eq!(index.lookup(b"a").unwrap().unwrap(), &[block(0, 2)]);
        assert_eq!(index.lookup(b"b").unwrap(), Some(&[][..]));
    }

    #[test]
    fn test_operations_after_close_fail() {
        let temp = TempDir::new().unwrap();
        let mut index = IndexManager::open(temp.path()).unwrap();
        index.close().unwrap();
        index.close().unwrap();

        assert!(matches!(index.lookup(b"a"), Err(BlockKvError::Closed)));
        assert!(matches!(index.put(&b"a"[..], Vec::new()), Err(BlockKvError::Closed)));
        assert!(matches!(index.remove(b"a"), Err(BlockKvError::Closed)));
    }
}
