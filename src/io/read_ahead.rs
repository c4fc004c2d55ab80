use bytes::Bytes;

use super::ByteSource;
use crate::error::{DmError, ParseError, ParseErrorKind};

/// Default read-ahead window: 64KB.
/// Large enough that a file-backed tree walk issues few reads, small enough
/// that skipping over a bulk array does not drag it into memory.
pub const DEFAULT_READ_AHEAD: usize = 64 * 1024;

/// Forward-only cursor over a [`ByteSource`] that reads through a window.
///
/// The tag tree is a long run of tiny big-endian fields. Reading each one
/// straight from a file-backed source would cost a syscall per field, so the
/// cursor fetches a window at a time and serves fields out of it. Skips move
/// the position without touching the bytes in between; a skip past the
/// window simply drops it.
///
/// Every read is bounds-checked against the source size. Running past the
/// end is reported as a [`ParseError`] at the current position, never as an
/// I/O error, since it means the structure declared more data than the file
/// holds.
pub struct ReadAhead<'a, S: ByteSource + ?Sized> {
    source: &'a S,
    size: u64,
    window_size: usize,
    window: Bytes,
    window_start: u64,
    pos: u64,
}

impl<'a, S: ByteSource + ?Sized> ReadAhead<'a, S> {
    /// Create a cursor at `start` with the default window size.
    pub fn new(source: &'a S, start: u64) -> Self {
        Self::with_window(source, start, DEFAULT_READ_AHEAD)
    }

    /// Create a cursor at `start` reading `window_size` bytes at a time.
    pub fn with_window(source: &'a S, start: u64, window_size: usize) -> Self {
        Self {
            source,
            size: source.size(),
            window_size: window_size.max(1),
            window: Bytes::new(),
            window_start: start,
            pos: start,
        }
    }

    /// Current absolute offset.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes between the cursor and the end of the source.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.size.saturating_sub(self.pos)
    }

    /// Fail unless `len` more bytes exist past the cursor.
    pub fn ensure(&self, len: u64) -> Result<(), DmError> {
        let available = self.remaining();
        if len > available {
            return Err(ParseError::new(
                self.pos,
                ParseErrorKind::UnexpectedEof {
                    needed: len,
                    available,
                },
            )
            .into());
        }
        Ok(())
    }

    /// Take the next `len` bytes and advance past them.
    pub fn take(&mut self, len: usize) -> Result<Bytes, DmError> {
        self.ensure(len as u64)?;

        let window_end = self.window_start + self.window.len() as u64;
        let bytes = if self.pos >= self.window_start && self.pos + len as u64 <= window_end {
            let start = (self.pos - self.window_start) as usize;
            self.window.slice(start..start + len)
        } else if len >= self.window_size {
            // Bigger than a window: read it directly and leave the window alone
            self.source.read_at(self.pos, len)?
        } else {
            let fill = (self.window_size as u64).min(self.remaining()) as usize;
            self.window = self.source.read_at(self.pos, fill)?;
            self.window_start = self.pos;
            self.window.slice(0..len)
        };

        self.pos += len as u64;
        Ok(bytes)
    }

    /// Take exactly `N` bytes as an array.
    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DmError> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    /// Advance `len` bytes without reading them.
    pub fn skip(&mut self, len: u64) -> Result<(), DmError> {
        self.ensure(len)?;
        self.pos += len;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DmError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_be_u16(&mut self) -> Result<u16, DmError> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_be_u32(&mut self) -> Result<u32, DmError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_be_i32(&mut self) -> Result<i32, DmError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_be_u64(&mut self) -> Result<u64, DmError> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_be_i64(&mut self) -> Result<i64, DmError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }
}
