//! # BlockKV
//!
//! An embedded key-value store with:
//! - Values split across blocks of fixed-capacity backing files
//! - A free block list reused by later writes (no coalescing)
//! - An in-memory index loaded on open and persisted on close
//! - A simple big-endian metadata format readable in one pass
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                               │
//! │        contains / open_read / load / upsert / remove         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────────┐
//!   │    Index    │          │   Value Store    │
//!   │ key → blocks│          │ files + free list│
//!   └──────┬──────┘          └────────┬─────────┘
//!          │                          │
//!          ▼                          ▼
//!     ┌─────────┐        ┌─────────────┐  ┌──────────────┐
//!     │  index  │        │ emptyBlocks │  │ backing files│
//!     └─────────┘        └─────────────┘  └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use blockkv::Store;
//!
//! # fn main() -> blockkv::Result<()> {
//! let mut store = Store::open_path(std::path::Path::new("./data"), 4096)?;
//! store.upsert(b"greeting", b"hello")?;
//! assert_eq!(store.load(b"greeting")?, b"hello");
//! store.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod store;
pub mod shared;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BlockKvError, Result};
pub use config::Config;
pub use shared::SharedStore;
pub use storage::{BlockLocation, Key};
pub use store::{Store, StoreStats, ValueReader};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of BlockKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
