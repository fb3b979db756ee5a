//! Write-ahead log of fact upserts.
//!
//! Every write is appended here before it reaches the in-memory index, and
//! the log is replayed on open.
//!
//! # File Format
//! ```text
//! [MAGIC: 4 bytes][VERSION: 1 byte]
//! [ENTRY 1: codec-encoded WalEntry]
//! [ENTRY 2: codec-encoded WalEntry]
//! ...
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Error as IoError, ErrorKind, Result as IoResult, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::codec;
use crate::fact::Fact;

/// Header length in bytes.
const HEADER_LEN: u64 = 5;

/// A single entry in the write-ahead log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonically increasing sequence number.
    pub sequence: u64,
    /// When this entry was written.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub written_at: DateTime<Utc>,
    pub kind: WalEntryKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "snake_case")]
pub enum WalEntryKind {
    /// A normalized fact; replay upserts it.
    FactUpsert(Fact),
}

fn lock_err(context: &'static str) -> IoError {
    IoError::new(ErrorKind::Other, format!("poisoned lock: {context}"))
}

#[derive(Debug)]
struct WalState {
    writer: BufWriter<File>,
    sequence: u64,
}

/// Append-only log, safe to share between threads.
#[derive(Debug)]
pub struct WriteAheadLog {
    path: PathBuf,
    state: Mutex<WalState>,
    sync_on_write: bool,
}

impl WriteAheadLog {
    /// Opens or creates a WAL file.
    ///
    /// An existing file is scanned for its last valid entry and cut back
    /// to it, so a torn or corrupted tail never precedes new appends. A new
    /// (or header-less) file gets a fresh header.
    ///
    /// # Errors
    /// `InvalidData` if an entry has an intact checksum but does not
    /// deserialize. The file is left untouched in that case.
    pub fn open(path: &Path, sync_on_write: bool) -> IoResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let sequence = if file_len >= HEADER_LEN {
            let (sequence, valid_len) = Self::find_valid_prefix(path)?;
            if valid_len < file_len {
                warn!(dropped_bytes = file_len - valid_len, "truncating invalid WAL tail");
                file.set_len(valid_len)?;
                if sync_on_write {
                    file.sync_all()?;
                }
            }
            sequence
        } else {
            let mut file = file;
            file.set_len(0)?;
            codec::write_header(&mut file)?;
            if sync_on_write {
                file.sync_all()?;
            }
            0
        };

        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(WalState {
                writer: BufWriter::new(file),
                sequence,
            }),
            sync_on_write,
        })
    }

    fn state(&self) -> IoResult<MutexGuard<'_, WalState>> {
        self.state.lock().map_err(|_| lock_err("wal"))
    }

    /// Appends an entry, returning its sequence number.
    ///
    /// # Errors
    /// `InvalidData` if the encoded entry would not read back on replay;
    /// nothing is written then.
    pub fn append(&self, kind: WalEntryKind) -> IoResult<u64> {
        let mut state = self.state()?;
        let candidate = state.sequence + 1;
        let entry = WalEntry {
            sequence: candidate,
            written_at: Utc::now(),
            kind,
        };
        let encoded = codec::encode(&entry)?;
        codec::decode::<WalEntry>(&mut encoded.as_slice())?;

        state.writer.write_all(&encoded)?;
        state.writer.flush()?;
        if self.sync_on_write {
            state.writer.get_ref().sync_all()?;
        }

        state.sequence = candidate;
        Ok(candidate)
    }

    /// Iterates over all entries, oldest first.
    pub fn iter(&self) -> IoResult<WalIterator> {
        WalIterator::new(&self.path)
    }

    /// Sequence number of the last appended entry (0 when empty).
    pub fn current_sequence(&self) -> IoResult<u64> {
        Ok(self.state()?.sequence)
    }

    /// File size in bytes, header included.
    pub fn size_bytes(&self) -> IoResult<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Empties the log down to its header.
    ///
    /// Only call this once the entries are durable elsewhere.
    pub fn truncate(&self) -> IoResult<()> {
        let mut state = self.state()?;
        state.writer.flush()?;

        let mut file = OpenOptions::new().write(true).truncate(true).open(&self.path)?;
        codec::write_header(&mut file)?;
        if self.sync_on_write {
            file.sync_all()?;
        }

        state.writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        state.sequence = 0;
        Ok(())
    }

    /// Last valid sequence number and the byte length of the entries up to
    /// and including it.
    fn find_valid_prefix(path: &Path) -> IoResult<(u64, u64)> {
        let mut iter = WalIterator::new(path)?;
        let mut last_seq = 0;
        let mut valid_len = HEADER_LEN;
        while let Some(entry) = iter.next() {
            match entry {
                Ok(entry) => {
                    last_seq = entry.sequence;
                    valid_len = iter.reader.stream_position()?;
                }
                Err(e) if codec::is_payload_error(&e) => {
                    return Err(IoError::new(
                        ErrorKind::InvalidData,
                        format!("unreadable WAL entry after sequence {last_seq}: {e}"),
                    ));
                }
                Err(e) => {
                    warn!(after_sequence = last_seq, error = %e, "WAL corruption detected");
                    break;
                }
            }
        }
        Ok((last_seq, valid_len))
    }
}

/// Iterator over WAL entries.
///
/// A torn final entry ends iteration silently; any other decoding failure
/// is yielded as an error.
#[derive(Debug)]
pub struct WalIterator {
    reader: BufReader<File>,
    file_size: u64,
}

impl WalIterator {
    fn new(path: &Path) -> IoResult<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        codec::read_header(&mut reader)?;
        Ok(Self { reader, file_size })
    }

    fn at_eof(&mut self) -> IoResult<bool> {
        Ok(self.reader.stream_position()? >= self.file_size)
    }
}

impl Iterator for WalIterator {
    type Item = IoResult<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.at_eof() {
            Ok(true) => return None,
            Ok(false) => {}
            Err(e) => return Some(Err(e)),
        }

        match codec::decode(&mut self.reader) {
            Ok(entry) => Some(Ok(entry)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                warn!("ignoring torn WAL tail");
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}
