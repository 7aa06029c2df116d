use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use strata_types::{PersistentRootId, RevisionNumber};
use tracing::{debug, warn};

use crate::branch::Branch;
use crate::config::{StoreConfig, SyncMode};
use crate::error::{StoreError, StoreResult};
use crate::record::{LogEntry, RevisionRecord};
use crate::storage::{RevisionStorage, StorageSnapshot};

/// File magic.
pub const MAGIC: &[u8; 4] = b"STRA";
/// On-disk format version.
pub const FORMAT_VERSION: u32 = 1;
/// Magic plus version.
const FILE_HEADER_SIZE: u64 = 8;
/// Frame header: 4 bytes length + 4 bytes CRC.
const FRAME_HEADER_SIZE: u64 = 8;

struct LogWriter {
    file: File,
    /// End of the last complete frame.
    offset: u64,
}

/// Append-only, crash-recoverable store log.
///
/// On-disk format:
/// ```text
/// [4 bytes: magic "STRA"][4 bytes: format version (little-endian u32)]
/// frames:
///   [4 bytes: payload length (little-endian u32)]
///   [4 bytes: CRC32 of payload (little-endian u32)]
///   [N bytes: payload (zstd-compressed bincode LogEntry)]
/// ```
///
/// Frames with a CRC mismatch are skipped; a truncated frame at the end of
/// the file is a torn write and is cut off when the log is opened. A frame
/// whose CRC matches but whose payload cannot be decoded is corruption.
pub struct LogFile {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    sync_mode: SyncMode,
    compression_level: i32,
}

impl LogFile {
    /// Open (or, when `create` is set, create) a log file.
    pub fn open(path: &Path, config: &StoreConfig, create: bool) -> StoreResult<Self> {
        let mut file = OpenOptions::new()
            .create(create)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::from_open(path, e))?;

        let len = file.metadata()?.len();
        if len == 0 {
            let mut header = Vec::with_capacity(FILE_HEADER_SIZE as usize);
            header.extend_from_slice(MAGIC);
            header.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
            file.write_all(&header)?;
            file.sync_all()?;
            debug!(path = %path.display(), "log file created");
        } else {
            check_header(&mut file, len, path)?;
        }

        let len = file.metadata()?.len();
        let (_, end) = scan_frames(&mut BufReader::new(&file), len)?;
        if end < len {
            warn!(path = %path.display(), end, len, "truncating torn log tail");
            file.set_len(end)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(LogWriter { file, offset: end }),
            sync_mode: config.sync_mode,
            compression_level: config.compression_level,
        })
    }

    /// Append one entry. Returns the byte offset of its frame.
    pub fn append(&self, entry: &LogEntry) -> StoreResult<u64> {
        let payload = self.encode(entry)?;
        let length = u32::try_from(payload.len()).map_err(|_| {
            StoreError::Write(format!("log entry too large: {} bytes", payload.len()))
        })?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE as usize + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut w = self.writer.lock().map_err(|_| StoreError::poisoned())?;
        let entry_offset = w.offset;

        if let Err(e) = write_frame(&mut w.file, &frame, self.sync_mode) {
            // Drop whatever part of the frame reached the file.
            let _ = w.file.set_len(entry_offset);
            return Err(StoreError::Write(e.to_string()));
        }
        w.offset += frame.len() as u64;

        debug!(offset = entry_offset, len = payload.len(), root = %entry.root(), "log append");
        Ok(entry_offset)
    }

    /// Decode every readable entry in append order.
    pub fn replay(&self) -> StoreResult<Vec<LogEntry>> {
        let w = self.writer.lock().map_err(|_| StoreError::poisoned())?;
        let file = File::open(&self.path).map_err(|e| StoreError::from_open(&self.path, e))?;
        let (payloads, _) = scan_frames(&mut BufReader::new(file), w.offset)?;
        drop(w);

        let entries = payloads
            .into_iter()
            .map(|(offset, payload)| self.decode(offset, &payload))
            .collect::<StoreResult<Vec<_>>>()?;
        debug!(path = %self.path.display(), entries = entries.len(), "log replayed");
        Ok(entries)
    }

    /// Bytes of complete frames, including the file header.
    pub fn len(&self) -> StoreResult<u64> {
        Ok(self.writer.lock().map_err(|_| StoreError::poisoned())?.offset)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == FILE_HEADER_SIZE)
    }

    pub fn sync(&self) -> StoreResult<()> {
        let w = self.writer.lock().map_err(|_| StoreError::poisoned())?;
        w.file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, entry: &LogEntry) -> StoreResult<Vec<u8>> {
        let bytes =
            bincode::serialize(entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
        zstd::encode_all(bytes.as_slice(), self.compression_level)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(&self, offset: u64, payload: &[u8]) -> StoreResult<LogEntry> {
        let corrupt = |reason: String| StoreError::Corrupt {
            path: self.path.clone(),
            reason: format!("frame at offset {offset}: {reason}"),
        };
        let bytes = zstd::decode_all(payload).map_err(|e| corrupt(e.to_string()))?;
        bincode::deserialize(&bytes).map_err(|e| corrupt(e.to_string()))
    }
}

fn write_frame(file: &mut File, frame: &[u8], sync_mode: SyncMode) -> io::Result<()> {
    file.write_all(frame)?;
    file.flush()?;
    if sync_mode == SyncMode::EveryWrite {
        file.sync_all()?;
    }
    Ok(())
}

fn check_header(file: &mut File, len: u64, path: &Path) -> StoreResult<()> {
    let corrupt = |reason: &str| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if len < FILE_HEADER_SIZE {
        return Err(corrupt("file shorter than header"));
    }
    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut header)?;
    if &header[..4] != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != FORMAT_VERSION {
        return Err(corrupt(&format!("unsupported format version {version}")));
    }
    Ok(())
}

type ScannedFrames = (Vec<(u64, Vec<u8>)>, u64);

/// Read frames between the file header and `limit`.
///
/// Returns the payloads that passed the CRC check, with their offsets, and
/// the end of the last complete frame.
fn scan_frames<R: Read + Seek>(reader: &mut R, limit: u64) -> io::Result<ScannedFrames> {
    let mut payloads = Vec::new();
    let mut offset = FILE_HEADER_SIZE;

    while offset + FRAME_HEADER_SIZE <= limit {
        reader.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; FRAME_HEADER_SIZE as usize];
        reader.read_exact(&mut header)?;
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 || offset + FRAME_HEADER_SIZE + length > limit {
            warn!(offset, length, limit, "invalid frame length; stopping recovery");
            return Ok((payloads, offset));
        }

        let mut payload = vec![0u8; length as usize];
        reader.read_exact(&mut payload)?;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc == expected_crc {
            payloads.push((offset, payload));
        } else {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping frame"
            );
        }
        offset += FRAME_HEADER_SIZE + length;
    }

    if offset < limit {
        warn!(offset, limit, "truncated frame header; stopping recovery");
    }
    Ok((payloads, offset))
}

/// Revision storage for one persistent root inside a [`LogFile`].
///
/// Several roots may share one log; their frames are told apart by the
/// root id every entry carries.
pub struct FileRevisionStorage {
    log: Arc<LogFile>,
    root: PersistentRootId,
}

impl FileRevisionStorage {
    pub fn new(log: Arc<LogFile>, root: PersistentRootId) -> Self {
        Self { log, root }
    }

    pub fn log(&self) -> &Arc<LogFile> {
        &self.log
    }
}

impl RevisionStorage for FileRevisionStorage {
    fn load(&self) -> StoreResult<StorageSnapshot> {
        let mut snapshot = StorageSnapshot::default();
        for entry in self.log.replay()? {
            if entry.root() == self.root {
                snapshot.apply(entry);
            }
        }
        Ok(snapshot)
    }

    fn append_revision(&self, record: &RevisionRecord) -> StoreResult<()> {
        self.log.append(&LogEntry::Revision(record.clone()))?;
        Ok(())
    }

    fn delete_revisions(&self, revisions: &BTreeSet<RevisionNumber>) -> StoreResult<()> {
        self.log.append(&LogEntry::Delete {
            root: self.root,
            revisions: revisions.clone(),
        })?;
        Ok(())
    }

    fn write_branch(&self, branch: &Branch) -> StoreResult<()> {
        self.log.append(&LogEntry::Branch {
            root: self.root,
            branch: branch.clone(),
        })?;
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.log.append(&LogEntry::Clear { root: self.root })?;
        Ok(())
    }

    fn size_in_bytes(&self) -> StoreResult<u64> {
        self.log.len()
    }

    fn close(&self) -> StoreResult<()> {
        self.log.sync()
    }
}
