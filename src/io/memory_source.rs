use std::fs;
use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use super::source::{check_range, ByteSource};
use crate::error::IoError;

/// Memory-backed implementation of [`ByteSource`].
///
/// The whole file is read into one owned buffer when the source is created.
/// `read_at()` then returns a slice of that buffer that shares its storage,
/// so no further I/O and no copy happens per request.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    identifier: String,
}

impl MemorySource {
    /// Read the entire file at `path` into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();
        let data = fs::read(path).map_err(|e| IoError::os(&identifier, e))?;

        debug!(path = %identifier, size = data.len(), "loaded memory-backed source");

        Ok(Self {
            data: Bytes::from(data),
            identifier,
        })
    }

    /// Wrap an already materialized buffer.
    pub fn from_bytes(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }

    /// The full buffer.
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn read_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.data.len() as u64)?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + len))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
