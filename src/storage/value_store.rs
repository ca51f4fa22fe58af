//! Value Store Manager
//!
//! Owns the backing files and the free block list.
//!
//! ## Responsibilities
//! - Place value bytes into free blocks, creating backing files on demand
//! - Split a block when only a prefix of it is needed
//! - Return freed blocks to the free list verbatim (no coalescing)
//! - Serve block reads through read-only memory maps
//! - Persist the free list on close
//!
//! File handles are opened for a single block access and dropped before the
//! call returns; nothing is cached between calls.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use tracing::debug;
use uuid::Uuid;

use crate::error::{BlockKvError, Result};

use super::codec;
use super::{is_metadata_file, BlockLocation, FREE_LIST_FILE_NAME};

/// Manages backing files and the free list
///
/// `free_blocks` is `None` once the manager has been closed; every
/// operation checks it first.
pub struct ValueStoreManager {
    /// Working directory holding backing files and `emptyBlocks`
    data_dir: PathBuf,

    /// Capacity of each new backing file
    block_file_size: u32,

    /// Where the free list is persisted
    free_list_path: PathBuf,

    /// Blocks not referenced by any key. Popped from the front, pushed at the back.
    free_blocks: Option<VecDeque<BlockLocation>>,
}

impl ValueStoreManager {
    /// Open the manager, loading `emptyBlocks` if present
    pub fn open(data_dir: &Path, block_file_size: u32) -> Result<Self> {
        let free_list_path = data_dir.join(FREE_LIST_FILE_NAME);
        let free_blocks =
            codec::load_if_exists(&free_list_path, codec::read_free_list)?.unwrap_or_default();

        debug!(
            dir = %data_dir.display(),
            free_blocks = free_blocks.len(),
            "Value store opened"
        );

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            block_file_size,
            free_list_path,
            free_blocks: Some(free_blocks),
        })
    }

    /// Write `value` into free blocks and return them in write order
    ///
    /// Blocks are taken from the front of the free list; when it runs dry a
    /// new backing file is created and its whole range becomes one block. A
    /// block larger than the remaining bytes is split and the unused tail goes
    /// back to the free list. An empty value yields an empty block list.
    pub fn allocate(&mut self, value: &[u8]) -> Result<Vec<BlockLocation>> {
        let data_dir = &self.data_dir;
        let block_file_size = self.block_file_size;
        let free_blocks = self.free_blocks.as_mut().ok_or(BlockKvError::Closed)?;

        let mut used: Vec<BlockLocation> = Vec::new();
        let mut written = 0usize;

        while written < value.len() {
            let block = match free_blocks.pop_front() {
                Some(block) => block,
                None => match Self::create_backing_file(data_dir, block_file_size) {
                    Ok(block) => block,
                    Err(e) => {
                        free_blocks.extend(used);
                        return Err(e);
                    }
                },
            };

            let remaining = value.len() - written;
            let take = remaining.min(block.size as usize);

            if let Err(e) = Self::write_block(data_dir, &block, &value[written..written + take]) {
                // Hand everything back so no block is orphaned
                free_blocks.push_front(block);
                free_blocks.extend(used);
                return Err(e);
            }

            if (block.size as usize) > take {
                let take = take as u32;
                debug!(
                    file = %block.file_name,
                    offset = block.offset,
                    used = take,
                    left = block.size - take,
                    "Splitting block"
                );
                free_blocks.push_back(BlockLocation::new(
                    block.file_name.clone(),
                    block.offset + take,
                    block.size - take,
                ));
                used.push(BlockLocation::new(block.file_name, block.offset, take));
            } else {
                used.push(block);
            }

            written += take;
        }

        Ok(used)
    }

    /// Open a reader over exactly `block.size` bytes at `block.offset`
    pub fn open_block(&self, block: &BlockLocation) -> Result<BlockReader> {
        self.ensure_open()?;
        Ok(BlockReader::open(&self.data_dir, block)?)
    }

    /// Append blocks to the free list as they are
    pub fn free<I>(&mut self, blocks: I) -> Result<()>
    where
        I: IntoIterator<Item = BlockLocation>,
    {
        let free_blocks = self.free_blocks.as_mut().ok_or(BlockKvError::Closed)?;
        free_blocks.extend(blocks);
        Ok(())
    }

    /// Persist the free list; later calls do nothing
    pub fn close(&mut self) -> Result<()> {
        let Some(free_blocks) = self.free_blocks.as_ref() else {
            return Ok(());
        };

        codec::save_atomic(&self.free_list_path, |w| codec::write_free_list(w, free_blocks))?;
        debug!(free_blocks = free_blocks.len(), "Free list persisted");

        self.free_blocks = None;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.free_blocks.is_none()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Snapshot of the free list, front first
    pub fn free_blocks(&self) -> Result<Vec<BlockLocation>> {
        let free_blocks = self.free_blocks.as_ref().ok_or(BlockKvError::Closed)?;
        Ok(free_blocks.iter().cloned().collect())
    }

    /// Number of blocks in the free list
    pub fn free_block_count(&self) -> Result<usize> {
        let free_blocks = self.free_blocks.as_ref().ok_or(BlockKvError::Closed)?;
        Ok(free_blocks.len())
    }

    /// Total bytes held by free blocks
    pub fn free_bytes(&self) -> Result<u64> {
        let free_blocks = self.free_blocks.as_ref().ok_or(BlockKvError::Closed)?;
        Ok(free_blocks.iter().map(|b| b.size as u64).sum())
    }

    /// Number of backing files in the working directory
    pub fn backing_file_count(&self) -> Result<usize> {
        self.ensure_open()?;
        let mut count = 0;
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if !is_metadata_file(&entry.file_name().to_string_lossy()) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Get the working directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the backing file capacity
    pub fn block_file_size(&self) -> u32 {
        self.block_file_size
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BlockKvError::Closed);
        }
        Ok(())
    }

    /// Create a new pre-sized backing file and return it as a single block
    fn create_backing_file(data_dir: &Path, block_file_size: u32) -> Result<BlockLocation> {
        let block = BlockLocation::new(Uuid::new_v4().to_string(), 0, block_file_size);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(block.path(data_dir))?;
        file.set_len(block_file_size as u64)?;

        debug!(file = %block.file_name, size = block_file_size, "Created backing file");
        Ok(block)
    }

    /// Write `bytes` at the start of `block` (seek + write, no full-file rewrite)
    fn write_block(data_dir: &Path, block: &BlockLocation, bytes: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new().write(true).open(block.path(data_dir))?;
        file.seek(SeekFrom::Start(block.offset as u64))?;
        file.write_all(bytes)?;
        Ok(())
    }
}

// =============================================================================
// Block Reader
// =============================================================================

/// Reads one block through a read-only memory map
///
/// The file handle is released as soon as the map is created; the map
/// covers exactly the block's range.
pub struct BlockReader {
    /// `None` for zero-length blocks, which cannot be mapped
    map: Option<Mmap>,
    pos: usize,
}

impl BlockReader {
    pub(crate) fn open(data_dir: &Path, block: &BlockLocation) -> io::Result<Self> {
        if block.size == 0 {
            return Ok(Self { map: None, pos: 0 });
        }

        let file = File::open(block.path(data_dir))?;
        let file_len = file.metadata()?.len();
        if file_len < block.end() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "block {}@{}+{} extends past end of file ({} bytes)",
                    block.file_name, block.offset, block.size, file_len
                ),
            ));
        }

        // SAFETY: the range lies within the file and the store is the only
        // writer of its working directory; blocks referenced by a live reader
        // cannot be rewritten while the reader borrows the store.
        let map = unsafe {
            MmapOptions::new()
                .offset(block.offset as u64)
                .len(block.size as usize)
                .map(&file)?
        };

        Ok(Self {
            map: Some(map),
            pos: 0,
        })
    }

    /// Total length of the block
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes not yet consumed by `read`
    pub fn remaining(&self) -> usize {
        self.len() - self.pos
    }

    /// The whole block, without copying
    pub fn as_slice(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}

impl Read for BlockReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rest = &self.as_slice()[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_manager(size: u32) -> (TempDir, ValueStoreManager) {
        let temp = TempDir::new().unwrap();
        let manager = ValueStoreManager::open(temp.path(), size).unwrap();
        (temp, manager)
    }

    fn read_all(manager: &ValueStoreManager, blocks: &[BlockLocation]) -> Vec<u8> {
        let mut out = Vec::new();
        for block in blocks {
            manager.open_block(block).unwrap().read_to_end(&mut out).unwrap();
        }
        out
    }

    #[test]
    fn test_allocate_empty_value() {
        let (_temp, mut manager) = setup_manager(16);
        let blocks = manager.allocate(b"").unwrap();
        assert!(blocks.is_empty());
        assert_eq!(manager.backing_file_count().unwrap(), 0);
    }

    #[test]
    fn test_allocate_splits_first_block() {
        let (_temp, mut manager) = setup_manager(16);
        let blocks = manager.allocate(b"hello").unwrap();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].offset, 0);
        assert_eq!(blocks[0].size, 5);

        let free = manager.free_blocks().unwrap();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].file_name, blocks[0].file_name);
        assert_eq!(free[0].offset, 5);
        assert_eq!(free[0].size, 11);
    }

    #[test]
    fn test_allocate_exact_file_size_does_not_split() {
        let (_temp, mut manager) = setup_manager(8);
        let blocks = manager.allocate(&[7u8; 8]).unwrap();

        assert_eq!(blocks, vec![BlockLocation::new(blocks[0].file_name.clone(), 0, 8)]);
        assert_eq!(manager.free_block_count().unwrap(), 0);
    }

    #[test]
    fn test_allocate_spans_files() {
        let (_temp, mut manager) = setup_manager(4);
        let value: Vec<u8> = (0..10).collect();
        let blocks = manager.allocate(&value).unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks.iter().map(|b| b.size).collect::<Vec<_>>(),
            vec![4, 4, 2]
        );
        assert_eq!(manager.backing_file_count().unwrap(), 3);
        assert_eq!(read_all(&manager, &blocks), value);
    }

    #[test]
    fn test_block_reader_stays_in_bounds() {
        let (_temp, mut manager) = setup_manager(32);
        let a = manager.allocate(b"aaaa").unwrap();
        let b = manager.allocate(b"bbbb").unwrap();

        assert_eq!(a[0].file_name, b[0].file_name);
        assert_eq!(read_all(&manager, &a), b"aaaa");
        assert_eq!(read_all(&manager, &b), b"bbbb");

        let reader = manager.open_block(&b[0]).unwrap();
        assert_eq!(reader.len(), 4);
        assert_eq!(reader.as_slice(), b"bbbb");
    }

    #[test]
    fn test_free_is_not_coalesced() {
        let (_temp, mut manager) = setup_manager(10);
        let a = manager.allocate(b"aaa").unwrap();
        let b = manager.allocate(b"bbb").unwrap();
        let before = manager.free_block_count().unwrap();

        manager.free(a.clone()).unwrap();
        manager.free(b.clone()).unwrap();

        let free = manager.free_blocks().unwrap();
        assert_eq!(free.len(), before + 2);
        assert_eq!(&free[free.len() - 2..], &[a[0].clone(), b[0].clone()]);
    }

    #[test]
    fn test_close_persists_free_list() {
        let (temp, mut manager) = setup_manager(10);
        manager.allocate(b"abc").unwrap();
        let free = manager.free_blocks().unwrap();
        manager.close().unwrap();

        let reopened = ValueStoreManager::open(temp.path(), 10).unwrap();
        assert_eq!(reopened.free_blocks().unwrap(), free);
    }

    #[test]
    fn test_operations_after_close_fail() {
        let (_temp, mut manager) = setup_manager(10);
        let blocks = manager.allocate(b"abc").unwrap();
        manager.close().unwrap();
        manager.close().unwrap();

        assert!(manager.is_closed());
        assert!(matches!(manager.allocate(b"x"), Err(BlockKvError::Closed)));
        assert!(matches!(manager.open_block(&blocks[0]), Err(BlockKvError::Closed)));
        assert!(matches!(manager.free(blocks), Err(BlockKvError::Closed)));
        assert!(matches!(manager.free_block_count(), Err(BlockKvError::Closed)));
    }

    #[test]
    fn test_block_past_end_of_file_is_io_error() {
        let (_temp, mut manager) = setup_manager(8);
        let blocks = manager.allocate(b"abc").unwrap();
        let bogus = BlockLocation::new(blocks[0].file_name.clone(), 6, 5);

        let err = manager.open_block(&bogus).err().unwrap();
        assert!(matches!(err, BlockKvError::Io(_)));
    }
}
