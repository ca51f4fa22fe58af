//! Configuration for BlockKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{BlockKvError, Result};

/// Main configuration for a BlockKV store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Working directory, must already exist.
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── index            (key → block list directory)
    ///     ├── emptyBlocks      (free block list)
    ///     └── <uuid>           (backing files, one per `block_file_size` bytes)
    pub data_dir: PathBuf,

    /// Capacity of every backing file in bytes
    pub block_file_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./blockkv_data"),
            block_file_size: 1024 * 1024, // 1 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check construction arguments before any file is touched.
    ///
    /// Offsets and sizes are persisted as int32, so a backing file may not
    /// exceed `i32::MAX` bytes.
    pub fn validate(&self) -> Result<()> {
        if self.block_file_size == 0 {
            return Err(BlockKvError::Config(format!(
                "block_file_size must be positive, but got {}",
                self.block_file_size
            )));
        }
        if self.block_file_size > i32::MAX as u32 {
            return Err(BlockKvError::Config(format!(
                "block_file_size must be at most {}, but got {}",
                i32::MAX,
                self.block_file_size
            )));
        }
        if !self.data_dir.exists() {
            return Err(BlockKvError::Config(format!(
                "data_dir {} does not exist",
                self.data_dir.display()
            )));
        }
        if !self.data_dir.is_dir() {
            return Err(BlockKvError::Config(format!(
                "data_dir {} is not a directory",
                self.data_dir.display()
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the working directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the backing file capacity (in bytes)
    pub fn block_file_size(mut self, size: u32) -> Self {
        self.config.block_file_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
