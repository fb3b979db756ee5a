//! File-backed [`DataSource`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::store_lock::StoreLock;
use super::segment::{read_segment, write_segment};
use super::wal::{WalEntryKind, WriteAheadLog};
use super::PersistentConfig;
use crate::fact::{Fact, FactFactory, PartialFact};
use crate::ids::FactId;
use crate::query::FactQuery;
use crate::storage::index::FactIndex;
use crate::storage::traits::{DataSource, StorageError};

const WAL_FILE: &str = "facts.wal";
const SEGMENT_FILE: &str = "facts.seg";

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

fn io_err(context: &'static str) -> impl FnOnce(std::io::Error) -> StorageError {
    move |e| match e.kind() {
        std::io::ErrorKind::InvalidData => StorageError::SerializationError(format!("{context}: {e}")),
        _ => StorageError::BackendError(format!("{context}: {e}")),
    }
}

/// Result of a compaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionResult {
    /// Facts written to the new segment.
    pub facts_written: usize,
    /// WAL entries folded into the segment.
    pub entries_compacted: u64,
    pub wal_size_before: u64,
    pub wal_size_after: u64,
}

/// Facts kept in memory and made durable through a write-ahead log.
///
/// Opening replays the snapshot segment and then the WAL. The directory is
/// locked for the lifetime of the value, so only one process can use it.
#[derive(Debug)]
pub struct PersistentDataSource {
    dir: PathBuf,
    _lock: StoreLock,
    wal: WriteAheadLog,
    index: RwLock<FactIndex>,
    factory: FactFactory,
    config: PersistentConfig,
}

impl PersistentDataSource {
    /// Opens or creates a store in `dir`.
    ///
    /// # Errors
    /// - `Validation` if the configuration is invalid
    /// - `BackendError` if the directory cannot be created or is locked by
    ///   another process
    /// - `SerializationError` if the segment is corrupted, or if the WAL
    ///   holds an intact entry that no longer deserializes
    pub fn open(dir: impl AsRef<Path>, config: PersistentConfig) -> Result<Self, StorageError> {
        Self::open_with_factory(dir, config, FactFactory::default())
    }

    /// Like [`open`](Self::open), normalizing partials with `factory`.
    ///
    /// # Errors
    /// See [`open`](Self::open).
    pub fn open_with_factory(
        dir: impl AsRef<Path>,
        config: PersistentConfig,
        factory: FactFactory,
    ) -> Result<Self, StorageError> {
        let config = config.validate()?;
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(io_err("failed to create store directory"))?;
        let lock = StoreLock::acquire(dir).map_err(io_err("failed to acquire lock"))?;
        let wal = WriteAheadLog::open(&dir.join(WAL_FILE), config.sync_on_write)
            .map_err(io_err("failed to open WAL"))?;

        let store = Self {
            dir: dir.to_path_buf(),
            _lock: lock,
            wal,
            index: RwLock::new(FactIndex::new()),
            factory,
            config,
        };
        store.load()?;
        Ok(store)
    }

    fn load(&self) -> Result<(), StorageError> {
        let mut index = self.index.write().map_err(|_| lock_err("facts load"))?;

        if let Some((header, facts)) =
            read_segment(&self.dir.join(SEGMENT_FILE)).map_err(io_err("failed to read segment"))?
        {
            debug!(facts = header.fact_count, up_to = header.up_to_sequence, "loaded segment");
            for fact in facts {
                index.upsert(fact);
            }
        }

        let mut replayed = 0u64;
        for entry in self.wal.iter().map_err(io_err("failed to iterate WAL"))? {
            let entry = entry.map_err(io_err("corrupted WAL entry"))?;
            let WalEntryKind::FactUpsert(fact) = entry.kind;
            index.upsert(fact);
            replayed += 1;
        }

        info!(
            dir = %self.dir.display(),
            facts = index.len(),
            replayed,
            "opened persistent store"
        );
        Ok(())
    }

    /// Directory holding the store files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of stored facts.
    ///
    /// # Errors
    /// `BackendError` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.index.read().map_err(|_| lock_err("facts read"))?.len())
    }

    /// # Errors
    /// `BackendError` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Current WAL size in bytes.
    ///
    /// # Errors
    /// `BackendError` if the file cannot be inspected.
    pub fn wal_size(&self) -> Result<u64, StorageError> {
        self.wal.size_bytes().map_err(io_err("failed to stat WAL"))
    }

    /// Writes every fact to a fresh segment and empties the WAL.
    ///
    /// Writers are blocked for the duration. If this fails partway, the WAL
    /// still holds everything and is replayed on the next open.
    ///
    /// # Errors
    /// `BackendError` if the segment or WAL cannot be written.
    pub fn compact(&self) -> Result<CompactionResult, StorageError> {
        let index = self.index.write().map_err(|_| lock_err("facts compact"))?;
        self.compact_locked(&index)
    }

    fn compact_locked(&self, index: &FactIndex) -> Result<CompactionResult, StorageError> {
        let wal_size_before = self.wal_size()?;
        let up_to_sequence = self
            .wal
            .current_sequence()
            .map_err(io_err("failed to read WAL sequence"))?;
        let facts = index.facts();

        write_segment(&self.dir.join(SEGMENT_FILE), &facts, up_to_sequence)
            .map_err(io_err("failed to write segment"))?;
        self.wal.truncate().map_err(io_err("failed to truncate WAL"))?;

        let result = CompactionResult {
            facts_written: facts.len(),
            entries_compacted: up_to_sequence,
            wal_size_before,
            wal_size_after: self.wal_size()?,
        };
        info!(
            facts = result.facts_written,
            entries = result.entries_compacted,
            "compacted WAL into segment"
        );
        Ok(result)
    }

    fn insert_at(&self, partial: PartialFact, at: DateTime<Utc>) -> Result<Fact, StorageError> {
        let fact = self.factory.make_at(partial, at)?;

        let mut index = self.index.write().map_err(|_| lock_err("facts write"))?;
        self.wal
            .append(WalEntryKind::FactUpsert(fact.clone()))
            .map_err(io_err("failed to append to WAL"))?;
        if let Some(previous) = index.upsert(fact.clone()) {
            warn!(fact_id = %fact.fact_id, previous_item = %previous.item_id, "overwrote existing fact");
        } else {
            debug!(fact_id = %fact.fact_id, item_id = %fact.item_id, attribute = %fact.attribute, "inserted fact");
        }

        // The fact is committed; a failed compaction is retried on a later write.
        if self.wal_size()? > self.config.max_wal_size {
            if let Err(e) = self.compact_locked(&index) {
                warn!(error = %e, "automatic compaction failed");
            }
        }
        Ok(fact)
    }
}

impl DataSource for PersistentDataSource {
    fn insert_fact(&self, partial: PartialFact) -> Result<Fact, StorageError> {
        self.insert_at(partial, self.factory.now())
    }

    fn insert_facts(&self, partials: Vec<PartialFact>) -> Result<Vec<Fact>, StorageError> {
        let at = self.factory.now();
        partials
            .into_iter()
            .map(|partial| self.insert_at(partial, at))
            .collect()
    }

    fn fetch_facts(&self, query: &FactQuery) -> Result<Vec<Fact>, StorageError> {
        let index = self.index.read().map_err(|_| lock_err("facts read"))?;
        Ok(index.query(query))
    }

    fn fetch_fact(&self, fact_id: &FactId) -> Result<Fact, StorageError> {
        let index = self.index.read().map_err(|_| lock_err("facts read"))?;
        index
            .get(fact_id)
            .cloned()
            .ok_or_else(|| StorageError::FactNotFound(fact_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config() -> PersistentConfig {
        PersistentConfig {
            sync_on_write: false,
            ..PersistentConfig::default()
        }
    }

    #[test]
    fn test_reopen_restores_facts() {
        let dir = tempdir().unwrap();
        let fact = {
            let store = PersistentDataSource::open(dir.path(), config()).unwrap();
            store
                .insert_fact(PartialFact::new().attribute("name").value(["Ethan"]))
                .unwrap()
        };

        let store = PersistentDataSource::open(dir.path(), config()).unwrap();
        assert_eq!(store.fetch_fact(&fact.fact_id).unwrap(), fact);
    }

    #[test]
    fn test_second_open_is_locked_out() {
        let dir = tempdir().unwrap();
        let _store = PersistentDataSource::open(dir.path(), config()).unwrap();
        let err = PersistentDataSource::open(dir.path(), config()).unwrap_err();
        assert!(err.to_string().contains("lock"));
    }

    #[test]
    fn test_compact_empties_wal_and_keeps_order() {
        let dir = tempdir().unwrap();
        let store = PersistentDataSource::open(dir.path(), config()).unwrap();
        let facts = store
            .insert_facts(vec![
                PartialFact::new().attribute("a").value(["1"]),
                PartialFact::new().attribute("b").value(["2"]),
            ])
            .unwrap();

        let result = store.compact().unwrap();
        assert_eq!(result.facts_written, 2);
        assert_eq!(result.entries_compacted, 2);
        assert!(result.wal_size_after < result.wal_size_before);
        drop(store);

        let store = PersistentDataSource::open(dir.path(), config()).unwrap();
        assert_eq!(store.fetch_facts(&FactQuery::new()).unwrap(), facts);
    }

    #[test]
    fn test_wal_over_limit_triggers_compaction() {
        let dir = tempdir().unwrap();
        let small = PersistentConfig {
            sync_on_write: false,
            max_wal_size: PersistentConfig::MIN_WAL_SIZE,
        };
        let store = PersistentDataSource::open(dir.path(), small).unwrap();
        let long = "x".repeat(512);
        for _ in 0..16 {
            store
                .insert_fact(PartialFact::new().attribute("blob").value([long.as_str()]))
                .unwrap();
        }
        assert!(store.wal_size().unwrap() <= PersistentConfig::MIN_WAL_SIZE);
        assert!(dir.path().join(SEGMENT_FILE).exists());
        assert_eq!(store.len().unwrap(), 16);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempdir().unwrap();
        let bad = PersistentConfig {
            max_wal_size: 1,
            ..config()
        };
        let err = PersistentDataSource::open(dir.path(), bad).unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }
}
