use bytes::Bytes;

use crate::error::IoError;

/// Trait for reading byte ranges from an opened DM file.
///
/// This is the capability every other layer goes through: the tag-tree
/// parser reads its windows through it and dataset assembly fetches pixel
/// payloads through it. Two implementations are chosen between at open
/// time, [`FileSource`](super::FileSource) and
/// [`MemorySource`](super::MemorySource), and they return byte-identical
/// content for the same range.
pub trait ByteSource {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    fn read_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Get the total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Get an identifier for this resource (for logging and error messages).
    fn identifier(&self) -> &str;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        (**self).read_at(offset, len)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn read_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        (**self).read_at(offset, len)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

/// Check that `offset..offset + len` lies inside a resource of `size` bytes.
pub(crate) fn check_range(offset: u64, len: usize, size: u64) -> Result<(), IoError> {
    let in_bounds = offset
        .checked_add(len as u64)
        .map(|end| end <= size)
        .unwrap_or(false);
    if in_bounds {
        Ok(())
    } else {
        Err(IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size,
        })
    }
}
