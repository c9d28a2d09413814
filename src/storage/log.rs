use crate::error::{LimoncelloError, Result};
use crate::storage::record::{read_frame, Frame, LogRecord};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Magic bytes for Limoncello files: "LMCL"
const MAGIC_BYTES: &[u8; 4] = b"LMCL";
const VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 16;

/// Append-only record log backing a collection store.
///
/// Layout: a 16 byte header (magic, version, reserved) followed by
/// checksummed record frames.
pub struct LogFile {
    file: File,
    path: PathBuf,
    len: u64,
}

impl LogFile {
    /// Create a new, empty log file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            return Err(LimoncelloError::InvalidFormat(
                "Database file already exists".to_string(),
            ));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        Self::write_header(&mut file)?;
        file.sync_all()?;

        Ok(Self {
            file,
            path,
            len: HEADER_SIZE as u64,
        })
    }

    /// Open an existing log file and return every committed record in order.
    ///
    /// A frame cut short at the end of the file is a write that never
    /// completed; it is dropped and the file is truncated back to the last
    /// whole record. Only a frame whose length checksum verifies, or a
    /// header fragment, counts as cut short.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<(Self, Vec<LogRecord>)> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        Self::read_header(&mut file)?;

        let mut body = Vec::new();
        file.read_to_end(&mut body)?;

        let mut records = Vec::new();
        let mut offset = 0usize;

        while offset < body.len() {
            match read_frame(&body[offset..]) {
                Frame::Valid { payload, len } => {
                    records.push(LogRecord::from_payload(payload)?);
                    offset += len;
                }
                Frame::Truncated => {
                    warn!(
                        path = %path.display(),
                        offset = HEADER_SIZE + offset,
                        dropped = body.len() - offset,
                        "discarding incomplete trailing record"
                    );
                    break;
                }
                Frame::Corrupt => {
                    return Err(LimoncelloError::ChecksumMismatch {
                        offset: (HEADER_SIZE + offset) as u64,
                    });
                }
            }
        }

        let len = (HEADER_SIZE + offset) as u64;
        if len < (HEADER_SIZE + body.len()) as u64 {
            file.set_len(len)?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), records = records.len(), "replayed log");

        Ok((Self { file, path, len }, records))
    }

    /// Append one record. On a failed write or sync the file is cut back so
    /// the frame is not replayed on the next open.
    pub fn append(&mut self, record: &LogRecord, sync: bool) -> Result<()> {
        let frame = record.to_frame()?;

        self.file.seek(SeekFrom::Start(self.len))?;
        if let Err(e) = self.file.write_all(&frame).and_then(|_| self.file.flush()) {
            let _ = self.file.set_len(self.len);
            return Err(LimoncelloError::StorageError(format!(
                "Failed to append record: {}",
                e
            )));
        }

        if sync {
            if let Err(e) = self.file.sync_data() {
                let _ = self.file.set_len(self.len);
                return Err(LimoncelloError::StorageError(format!(
                    "Failed to sync record: {}",
                    e
                )));
            }
        }

        self.len += frame.len() as u64;
        Ok(())
    }

    /// Replace the whole log with `records`.
    ///
    /// The new log is written beside the old one, fsynced, then renamed over
    /// it, so a crash leaves either the old or the new file intact.
    pub fn rewrite<'a, I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a LogRecord>,
    {
        let tmp_path = self.path.with_extension("compact");
        let _ = fs::remove_file(&tmp_path);

        let mut tmp = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;

        Self::write_header(&mut tmp)?;
        let mut len = HEADER_SIZE as u64;
        for record in records {
            let frame = record.to_frame()?;
            tmp.write_all(&frame)?;
            len += frame.len() as u64;
        }
        tmp.flush()?;
        tmp.sync_all()?;

        fs::rename(&tmp_path, &self.path)?;
        sync_parent_dir(&self.path)?;

        self.file = tmp;
        self.len = len;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_header(file: &mut File) -> Result<()> {
        file.write_all(MAGIC_BYTES)?;
        file.write_all(&VERSION.to_le_bytes())?;
        file.write_all(&[0u8; HEADER_SIZE - 8])?;
        file.flush()?;
        Ok(())
    }

    fn read_header(file: &mut File) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header).map_err(|_| {
            LimoncelloError::InvalidFormat("File too short for header".to_string())
        })?;

        if &header[0..4] != MAGIC_BYTES {
            return Err(LimoncelloError::InvalidFormat(
                "Invalid magic bytes".to_string(),
            ));
        }

        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != VERSION {
            return Err(LimoncelloError::VersionMismatch {
                expected: VERSION,
                actual: version,
            });
        }

        Ok(())
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn put(key: &str) -> LogRecord {
        LogRecord::Put {
            collection: "docs".to_string(),
            key: key.to_string(),
            value: vec![7; 16],
        }
    }

    #[test]
    fn test_create_and_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let log = LogFile::create(&path).unwrap();
        assert_eq!(log.len(), HEADER_SIZE as u64);
        drop(log);

        let (log, records) = LogFile::open(&path).unwrap();
        assert_eq!(log.len(), HEADER_SIZE as u64);
        assert!(records.is_empty());
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        LogFile::create(&path).unwrap();
        assert!(LogFile::create(&path).is_err());
    }

    #[test]
    fn test_append_and_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut log = LogFile::create(&path).unwrap();
        let create = LogRecord::CreateCollection { name: "docs".to_string() };
        log.append(&create, false).unwrap();
        log.append(&put("a"), true).unwrap();
        drop(log);

        let (_, records) = LogFile::open(&path).unwrap();
        assert_eq!(records, vec![create, put("a")]);
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut log = LogFile::create(&path).unwrap();
        log.append(&put("a"), false).unwrap();
        let good_len = log.len();
        drop(log);

        // Simulate a crash halfway through the second append
        let frame = put("b").to_frame().unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&frame[..frame.len() / 2]).unwrap();
        drop(file);

        let (log, records) = LogFile::open(&path).unwrap();
        assert_eq!(records, vec![put("a")]);
        assert_eq!(log.len(), good_len);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
    }

    #[test]
    fn test_corrupt_record_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut log = LogFile::create(&path).unwrap();
        log.append(&put("a"), false).unwrap();
        drop(log);

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        match LogFile::open(&path) {
            Err(LimoncelloError::ChecksumMismatch { offset }) => {
                assert_eq!(offset, HEADER_SIZE as u64)
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("corrupt log opened successfully"),
        }
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        fs::write(&path, [0u8; HEADER_SIZE]).unwrap();

        assert!(matches!(
            LogFile::open(&path),
            Err(LimoncelloError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(MAGIC_BYTES);
        header[4..8].copy_from_slice(&(VERSION + 1).to_le_bytes());
        fs::write(&path, header).unwrap();

        match LogFile::open(&path) {
            Err(LimoncelloError::VersionMismatch { expected, actual }) => {
                assert_eq!(expected, VERSION);
                assert_eq!(actual, VERSION + 1);
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("log with a future version opened successfully"),
        }
    }

    #[test]
    fn test_corrupt_length_keeps_file_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut log = LogFile::create(&path).unwrap();
        log.append(&LogRecord::CreateCollection { name: "docs".to_string() }, false)
            .unwrap();
        for key in ["a", "b", "c", "d", "e"] {
            log.append(&put(key), false).unwrap();
        }
        drop(log);

        // High byte of the first frame's length
        let mut bytes = fs::read(&path).unwrap();
        let size = bytes.len() as u64;
        bytes[HEADER_SIZE + 3] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        match LogFile::open(&path) {
            Err(LimoncelloError::ChecksumMismatch { offset }) => {
                assert_eq!(offset, HEADER_SIZE as u64)
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("log with a damaged length opened successfully"),
        }
        assert_eq!(fs::metadata(&path).unwrap().len(), size);
    }

    #[test]
    fn test_rewrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut log = LogFile::create(&path).unwrap();
        for key in ["a", "b", "c", "a", "b"] {
            log.append(&put(key), false).unwrap();
        }
        let before = log.len();

        let kept = vec![put("c")];
        log.rewrite(&kept).unwrap();
        assert!(log.len() < before);

        // Appends after a rewrite land in the new file
        log.append(&put("d"), true).unwrap();
        drop(log);

        let (_, records) = LogFile::open(&path).unwrap();
        assert_eq!(records, vec![put("c"), put("d")]);
        assert!(!path.with_extension("compact").exists());
    }
}
