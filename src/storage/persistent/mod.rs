//! Persistent storage backend.
//!
//! A file-backed [`DataSource`](crate::storage::DataSource) with:
//! - a write-ahead log of fact upserts, replayed on open
//! - an exclusive directory lock so only one process opens a store
//! - CRC32 checksums for corruption detection
//! - compaction into a single snapshot segment
//!
//! # Layout
//!
//! ```text
//! <dir>/
//! ├── facts.lock  exclusive lock, holds the owner's pid
//! ├── facts.seg   snapshot written by compaction
//! └── facts.wal   upserts since the last compaction
//! ```

mod codec;
mod segment;
mod store;
mod store_lock;
mod wal;

pub use segment::SegmentHeader;
pub use store::{CompactionResult, PersistentDataSource};
pub use store_lock::StoreLock;
pub use wal::{WalEntry, WalEntryKind, WalIterator, WriteAheadLog};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::storage::StorageError;

/// Configuration for persistent storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentConfig {
    /// Whether to fsync after every write (slower but safer).
    pub sync_on_write: bool,
    /// WAL size in bytes above which a write triggers compaction.
    pub max_wal_size: u64,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            max_wal_size: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl PersistentConfig {
    /// Smallest accepted `max_wal_size`; smaller limits compact on nearly
    /// every write.
    pub const MIN_WAL_SIZE: u64 = 4 * 1024;

    /// # Errors
    /// `InvalidConfig` if `max_wal_size` is below [`Self::MIN_WAL_SIZE`].
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.max_wal_size < Self::MIN_WAL_SIZE {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "max_wal_size must be at least {} bytes (got {})",
                    Self::MIN_WAL_SIZE,
                    self.max_wal_size
                ),
            });
        }
        Ok(self)
    }
}

/// Opens or creates a persistent store at `path`.
///
/// # Errors
/// - If the configuration is invalid
/// - If the path cannot be created or another process holds the lock
/// - If the segment is corrupted
///
/// # Example
/// ```no_run
/// use itemdrive::storage::persistent::open_data_source;
///
/// let source = open_data_source("./facts.db", None)?;
/// # Ok::<(), itemdrive::StorageError>(())
/// ```
pub fn open_data_source(
    path: impl AsRef<Path>,
    config: Option<PersistentConfig>,
) -> Result<PersistentDataSource, StorageError> {
    PersistentDataSource::open(path, config.unwrap_or_default())
}
