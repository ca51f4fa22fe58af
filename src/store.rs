//! Store Module
//!
//! The public key-value API, composed from the index and value store managers.
//!
//! ## Responsibilities
//! - Translate reads into index lookups + block reads
//! - Translate writes into frees, allocations and index updates
//! - Own the Open → Closed lifecycle
//!
//! ## Concurrency
//! None. Mutating calls take `&mut self`; callers sharing a store across
//! threads wrap it in a lock (see [`crate::SharedStore`]).

use std::io::{self, Read};
use std::path::Path;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{BlockKvError, Result};
use crate::storage::{BlockLocation, BlockReader, IndexManager, Key, ValueStoreManager};

/// An embedded key-value store over fixed-capacity block files
///
/// ## Lifecycle
/// `Open --close()--> Closed`. Once closed, every call other than `close()`
/// returns [`BlockKvError::Closed`]. The index and free list are written to
/// disk by `close()`; dropping an open store closes it on a best-effort basis.
pub struct Store {
    /// Store configuration
    config: Config,

    /// Key → block list directory
    index: IndexManager,

    /// Backing files and free list
    values: ValueStoreManager,
}

impl Store {
    /// Open a store over an existing working directory
    ///
    /// On startup:
    /// 1. Validate the configuration
    /// 2. Load the index if `index` exists
    /// 3. Load the free list if `emptyBlocks` exists
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let index = IndexManager::open(&config.data_dir)?;
        let values = ValueStoreManager::open(&config.data_dir, config.block_file_size)?;

        let keys = index.len()?;
        let free_blocks = values.free_block_count()?;
        info!(
            dir = %config.data_dir.display(),
            block_file_size = config.block_file_size,
            keys,
            free_blocks,
            "Store opened"
        );

        Ok(Self {
            config,
            index,
            values,
        })
    }

    /// Open with a path and backing file size (convenience method)
    pub fn open_path(path: &Path, block_file_size: u32) -> Result<Self> {
        let config = Config::builder()
            .data_dir(path)
            .block_file_size(block_file_size)
            .build();
        Self::open(config)
    }

    /// True if `key` is stored (including with an empty value)
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.index.lookup(key)?.is_some())
    }

    /// Open a lazy reader over the value stored under `key`
    ///
    /// The reader borrows the store, so the value cannot be overwritten or
    /// freed while it is being read.
    pub fn open_read(&self, key: &[u8]) -> Result<ValueReader<'_>> {
        self.ensure_open()?;
        let blocks = self.index.lookup(key)?.ok_or(BlockKvError::KeyNotFound)?;
        Ok(ValueReader::new(self.values.data_dir(), blocks))
    }

    /// Read the whole value stored under `key`
    pub fn load(&self, key: &[u8]) -> Result<Vec<u8>> {
        let mut reader = self.open_read(key)?;
        // Block sizes come from the index file; never trust them for allocation
        let hint = reader.len().min(self.config.block_file_size as u64);
        let mut value = Vec::with_capacity(hint as usize);
        reader.read_to_end(&mut value)?;
        Ok(value)
    }

    /// Insert or replace the value under `key`
    ///
    /// An existing value's blocks are released before the new value is
    /// placed, so a same-size or smaller replacement reuses that space. If
    /// placing the new value fails, the key is left absent.
    pub fn upsert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_open()?;

        if let Some(old) = self.index.remove(key)? {
            self.values.free(old)?;
        }

        let blocks = self.values.allocate(value)?;
        self.index.put(Key::copy_from_slice(key), blocks)
    }

    /// Remove `key`, returning whether it was present
    pub fn remove(&mut self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;

        match self.index.remove(key)? {
            Some(blocks) => {
                self.values.free(blocks)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Persist the index and free list, then refuse further operations
    ///
    /// Both managers are closed even if the first one fails; the first error
    /// is returned. Calling `close()` again retries only what did not finish.
    pub fn close(&mut self) -> Result<()> {
        if self.is_closed_fully() {
            return Ok(());
        }

        let index_result = self.index.close();
        let values_result = self.values.close();
        index_result?;
        values_result?;

        info!(dir = %self.config.data_dir.display(), "Store closed");
        Ok(())
    }

    /// True once `close()` has been called (even if it failed part-way)
    pub fn is_closed(&self) -> bool {
        self.index.is_closed() || self.values.is_closed()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of stored keys
    pub fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        self.index.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.ensure_open()?;
        self.index.is_empty()
    }

    /// Iterate over stored keys in no particular order
    pub fn keys(&self) -> Result<impl Iterator<Item = &Key>> {
        self.ensure_open()?;
        self.index.keys()
    }

    /// Space accounting snapshot
    pub fn stats(&self) -> Result<StoreStats> {
        self.ensure_open()?;
        Ok(StoreStats {
            keys: self.index.len()?,
            free_blocks: self.values.free_block_count()?,
            free_bytes: self.values.free_bytes()?,
            backing_files: self.values.backing_file_count()?,
        })
    }

    /// Blocks currently holding the value for `key` (for testing and debugging)
    pub fn blocks(&self, key: &[u8]) -> Result<Option<&[BlockLocation]>> {
        self.ensure_open()?;
        self.index.lookup(key)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BlockKvError::Closed);
        }
        Ok(())
    }

    fn is_closed_fully(&self) -> bool {
        self.index.is_closed() && self.values.is_closed()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.is_closed_fully() {
            return;
        }
        if let Err(e) = self.close() {
            warn!(
                dir = %self.config.data_dir.display(),
                error = %e,
                "Failed to close store on drop"
            );
        }
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Space accounting for a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Stored keys
    pub keys: usize,
    /// Blocks in the free list
    pub free_blocks: usize,
    /// Bytes held by free blocks
    pub free_bytes: u64,
    /// Backing files in the working directory
    pub backing_files: usize,
}

// =============================================================================
// Value Reader
// =============================================================================

/// Reads a value as the concatenation of its blocks
///
/// Each block is mapped only when the reader reaches it.
pub struct ValueReader<'a> {
    data_dir: &'a Path,
    blocks: &'a [BlockLocation],
    /// Index of the next block to open
    next: usize,
    current: Option<BlockReader>,
    len: u64,
}

impl<'a> ValueReader<'a> {
    fn new(data_dir: &'a Path, blocks: &'a [BlockLocation]) -> Self {
        let len = blocks.iter().map(|b| b.size as u64).sum();
        Self {
            data_dir,
            blocks,
            next: 0,
            current: None,
            len,
        }
    }

    /// Total value length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks the value is split across
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl Read for ValueReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if let Some(current) = self.current.as_mut() {
                let n = current.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
                self.current = None;
            }

            let Some(block) = self.blocks.get(self.next) else {
                return Ok(0);
            };
            self.current = Some(BlockReader::open(self.data_dir, block)?);
            self.next += 1;
        }
    }
}
