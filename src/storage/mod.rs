//! Storage Module
//!
//! Block-file storage layer: backing files, free list, index and their
//! on-disk metadata.
//!
//! ## Responsibilities
//! - Place values into fixed-capacity backing files, split across blocks
//! - Track free blocks (never coalesced)
//! - Keep the key → block list directory in memory
//! - Persist both maps on close, load them on open
//!
//! ## Working Directory Layout
//! ```text
//! {data_dir}/
//! ├── index          key → [block, block, ...]
//! ├── emptyBlocks    [block, block, ...]
//! ├── 3f2a...-uuid   backing file (block_file_size bytes)
//! └── 9c41...-uuid   backing file (block_file_size bytes)
//! ```
//!
//! A backing file is always partitioned without gaps into blocks, each of
//! which is owned either by the free list or by exactly one key.

pub mod codec;
mod index;
mod value_store;

use std::path::{Path, PathBuf};

pub use index::IndexManager;
pub use value_store::{BlockReader, ValueStoreManager};

/// Keys compare and hash by content
pub type Key = bytes::Bytes;

/// Name of the persisted index file
pub const INDEX_FILE_NAME: &str = "index";

/// Name of the persisted free list file
pub const FREE_LIST_FILE_NAME: &str = "emptyBlocks";

/// True if `name` is one of the store's metadata files (or a pending save of one)
pub(crate) fn is_metadata_file(name: &str) -> bool {
    let base = name.strip_suffix(".tmp").unwrap_or(name);
    base == INDEX_FILE_NAME || base == FREE_LIST_FILE_NAME
}

// =============================================================================
// Block Descriptor
// =============================================================================

/// A contiguous byte range inside one backing file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockLocation {
    /// Backing file name, relative to the working directory
    pub file_name: String,
    /// Byte offset of the block within the file
    pub offset: u32,
    /// Block length in bytes
    pub size: u32,
}

impl BlockLocation {
    pub fn new(file_name: impl Into<String>, offset: u32, size: u32) -> Self {
        Self {
            file_name: file_name.into(),
            offset,
            size,
        }
    }

    /// Full path of the backing file holding this block
    pub fn path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file_name)
    }

    /// Offset one past the last byte of the block
    pub fn end(&self) -> u32 {
        self.offset + self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_path_and_end() {
        let block = BlockLocation::new("abc", 10, 5);
        assert_eq!(block.path(Path::new("/data")), PathBuf::from("/data/abc"));
        assert_eq!(block.end(), 15);
    }

    #[test]
    fn test_metadata_names() {
        assert!(is_metadata_file("index"));
        assert!(is_metadata_file("emptyBlocks"));
        assert!(is_metadata_file("index.tmp"));
        assert!(!is_metadata_file("0f8fad5b-d9cb-469f-a165-70867728950e"));
    }
}
