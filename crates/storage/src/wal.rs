//! Write-Ahead Log (WAL) for durability.
//!
//! Format: each entry is `[4-byte CRC32][4-byte length][JSON LogEntry]\n`.
//! On recovery, replay all valid entries. A torn or corrupt tail stops
//! replay and is cut off before new entries are appended; an entry whose
//! checksum matches but whose record fails validation is an error.

use crate::record::{LogEntry, RecordError};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("WAL I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("WAL serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("WAL entry of {len} bytes exceeds the {limit} byte frame limit")]
    FrameTooLarge { len: usize, limit: usize },
    #[error("WAL entry {entry} holds an invalid record: {source}")]
    Invalid {
        entry: u64,
        #[source]
        source: RecordError,
    },
}

/// Fsync policy for the WAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    /// Fsync after every write.
    Always,
    /// Fsync periodically (caller controls).
    Batch,
    /// Never explicitly fsync (OS decides).
    None,
}

impl FromStr for FsyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "batch" => Ok(Self::Batch),
            "none" => Ok(Self::None),
            other => Err(format!("unknown fsync policy '{}'", other)),
        }
    }
}

/// Largest payload a frame may carry. A length header above this is
/// treated as corruption.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// CRC + length header and trailing newline.
const FRAME_OVERHEAD: u64 = 9;

/// Entries recovered from a log, and where the intact part of it ends.
#[derive(Debug, Default)]
pub struct Replay {
    pub entries: Vec<LogEntry>,
    /// Byte length of the prefix made of whole, checksummed frames.
    pub valid_len: u64,
}

/// An append-only write-ahead log.
#[derive(Debug)]
pub struct Wal {
    writer: BufWriter<File>,
    fsync: FsyncPolicy,
}

impl Wal {
    /// Open or create a WAL file at the given path.
    pub fn open(path: &Path, fsync: FsyncPolicy) -> Result<Self, WalError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            fsync,
        })
    }

    /// Append an entry. Under [`FsyncPolicy::Always`] the entry is on disk
    /// when this returns.
    pub fn append(&mut self, entry: &LogEntry) -> Result<(), WalError> {
        let payload = serde_json::to_vec(entry)?;
        if payload.len() > MAX_FRAME_BYTES {
            return Err(WalError::FrameTooLarge {
                len: payload.len(),
                limit: MAX_FRAME_BYTES,
            });
        }
        let frame = encode_frame(&payload);
        self.writer.write_all(&frame)?;
        self.writer.flush()?;

        if self.fsync == FsyncPolicy::Always {
            self.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Explicitly fsync the WAL (for batch mode).
    pub fn sync(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Replay all valid entries from a WAL file, in order.
    pub fn replay(path: &Path) -> Result<Replay, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(WalError::Io(e)),
        };

        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();
        let mut index = 0u64;

        while let Some(payload) = read_frame(&mut reader, index)? {
            let entry: LogEntry = serde_json::from_slice(&payload)?;
            if let Some(record) = &entry.record {
                record
                    .validate()
                    .map_err(|source| WalError::Invalid { entry: index, source })?;
            }
            replay.entries.push(entry);
            replay.valid_len += FRAME_OVERHEAD + payload.len() as u64;
            index += 1;
        }

        Ok(replay)
    }

    /// Cut the file back to `valid_len` bytes so new frames follow the last
    /// intact one. Returns how many bytes were dropped.
    pub fn truncate_tail(path: &Path, valid_len: u64) -> Result<u64, WalError> {
        let file = match OpenOptions::new().write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(WalError::Io(e)),
        };
        let len = file.metadata()?.len();
        if len <= valid_len {
            return Ok(0);
        }
        file.set_len(valid_len)?;
        file.sync_all()?;
        Ok(len - valid_len)
    }
}

/// CRC(4) + LEN(4) + PAYLOAD + `\n`, integers little-endian.
fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + FRAME_OVERHEAD as usize);
    frame.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    frame.push(b'\n');
    frame
}

/// Read one framed payload. `Ok(None)` marks the end of the usable log:
/// a clean EOF, a torn tail, or a checksum mismatch.
fn read_frame<R: Read>(reader: &mut R, index: u64) -> Result<Option<Vec<u8>>, WalError> {
    let mut crc_buf = [0u8; 4];
    match reader.read_exact(&mut crc_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(WalError::Io(e)),
    }
    let expected_crc = u32::from_le_bytes(crc_buf);

    let mut len_buf = [0u8; 4];
    if !read_or_torn(reader, &mut len_buf, index)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        tracing::warn!(
            "WAL entry {} claims {} bytes, over the {} byte limit; stopping replay",
            index,
            len,
            MAX_FRAME_BYTES
        );
        return Ok(None);
    }
    let mut payload = vec![0u8; len];
    if !read_or_torn(reader, &mut payload, index)? {
        return Ok(None);
    }
    let mut newline = [0u8; 1];
    if !read_or_torn(reader, &mut newline, index)? {
        return Ok(None);
    }

    let actual_crc = crc32fast::hash(&payload);
    if actual_crc != expected_crc {
        tracing::warn!(
            "WAL CRC mismatch at entry {}: expected {:#010x}, got {:#010x}; stopping replay",
            index,
            expected_crc,
            actual_crc
        );
        return Ok(None);
    }

    Ok(Some(payload))
}

/// `read_exact` that treats EOF as a torn entry instead of an error.
fn read_or_torn<R: Read>(reader: &mut R, buf: &mut [u8], index: u64) -> Result<bool, WalError> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            tracing::warn!("WAL truncated mid-entry at entry {}; stopping replay", index);
            Ok(false)
        }
        Err(e) => Err(WalError::Io(e)),
    }
}
