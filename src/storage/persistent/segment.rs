//! Snapshot segment written by compaction.
//!
//! A segment holds every stored fact, in insertion order, as of a WAL
//! sequence number. It is written to a temporary file and renamed into
//! place, so a crash leaves either the old or the new snapshot.
//!
//! # File Format
//! ```text
//! [MAGIC: 4 bytes][VERSION: 1 byte]
//! [SegmentHeader]
//! [Fact 1] ... [Fact N]
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Error as IoError, ErrorKind, Result as IoResult, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::codec;
use crate::fact::Fact;

/// Segment file header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentHeader {
    /// Last WAL sequence folded into this segment.
    pub up_to_sequence: u64,
    pub fact_count: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Writes `facts` as the segment at `path`, replacing any previous one.
pub fn write_segment(path: &Path, facts: &[Fact], up_to_sequence: u64) -> IoResult<SegmentHeader> {
    let temp_path = temp_path_for(path);
    let result = write_to(&temp_path, facts, up_to_sequence).and_then(|header| {
        fs::rename(&temp_path, path)?;
        Ok(header)
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn temp_path_for(path: &Path) -> PathBuf {
    path.with_extension(format!("seg.tmp.{}", Uuid::new_v4()))
}

fn write_to(path: &Path, facts: &[Fact], up_to_sequence: u64) -> IoResult<SegmentHeader> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    codec::write_header(&mut writer)?;

    let header = SegmentHeader {
        up_to_sequence,
        fact_count: facts.len() as u64,
        created_at: Utc::now(),
    };
    writer.write_all(&codec::encode(&header)?)?;
    for fact in facts {
        writer.write_all(&codec::encode(fact)?)?;
    }

    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(header)
}

/// Reads the segment at `path`; `None` if there is none yet.
///
/// Unlike the WAL, a segment is never torn, so any short read is
/// corruption.
pub fn read_segment(path: &Path) -> IoResult<Option<(SegmentHeader, Vec<Fact>)>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    codec::read_header(&mut reader)?;
    let header: SegmentHeader = codec::decode(&mut reader)?;

    let count = usize::try_from(header.fact_count)
        .map_err(|_| IoError::new(ErrorKind::InvalidData, "segment fact count overflows usize"))?;
    let mut facts = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        facts.push(codec::decode(&mut reader)?);
    }
    Ok(Some((header, facts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::{make_fact_at, PartialFact};
    use tempfile::tempdir;

    fn facts(n: usize) -> Vec<Fact> {
        (0..n)
            .map(|i| {
                make_fact_at(
                    PartialFact::new().attribute("n").value([i.to_string()]),
                    DateTime::UNIX_EPOCH,
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_missing_segment_is_none() {
        let dir = tempdir().unwrap();
        assert!(read_segment(&dir.path().join("facts.seg")).unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facts.seg");
        let written = facts(3);

        let header = write_segment(&path, &written, 7).unwrap();
        assert_eq!(header.fact_count, 3);

        let (header, read) = read_segment(&path).unwrap().unwrap();
        assert_eq!(header.up_to_sequence, 7);
        assert_eq!(read, written);
    }

    #[test]
    fn test_rewrite_replaces_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facts.seg");
        write_segment(&path, &facts(3), 1).unwrap();
        write_segment(&path, &facts(1), 2).unwrap();

        let (header, read) = read_segment(&path).unwrap().unwrap();
        assert_eq!(header.up_to_sequence, 2);
        assert_eq!(read.len(), 1);
        // No temporary files left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_truncated_segment_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facts.seg");
        write_segment(&path, &facts(2), 1).unwrap();
        let len = fs::metadata(&path).unwrap().len();
        OpenOptions::new().write(true).open(&path).unwrap().set_len(len - 1).unwrap();

        assert!(read_segment(&path).is_err());
    }
}
