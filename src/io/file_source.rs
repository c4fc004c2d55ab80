use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use bytes::Bytes;
use tracing::debug;

use super::source::{check_range, ByteSource};
use crate::error::IoError;

/// File-backed implementation of [`ByteSource`].
///
/// Every request seeks the open handle and reads the range into a fresh
/// buffer, so memory use stays bounded by the largest single request.
/// The file size is captured once on open.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl FileSource {
    /// Open `path` for positioned reads.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();
        let file = File::open(path).map_err(|e| IoError::os(&identifier, e))?;
        let size = file
            .metadata()
            .map_err(|e| IoError::os(&identifier, e))?
            .len();

        debug!(path = %identifier, size, "opened file-backed source");

        Ok(Self {
            file: Mutex::new(file),
            size,
            identifier,
        })
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;

        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut file = self
            .file
            .lock()
            .map_err(|_| IoError::Poisoned(self.identifier.clone()))?;

        let mut buf = vec![0u8; len];
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| IoError::os(&self.identifier, e))?;
        file.read_exact(&mut buf)
            .map_err(|e| IoError::os(&self.identifier, e))?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
