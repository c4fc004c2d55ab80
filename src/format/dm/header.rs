//! DM file header parsing.
//!
//! The header is the only fixed-position structure in the file. It tells
//! us which generation we are reading and the byte order of tag data.
//!
//! # Header Structure
//!
//! ## DM3 (12 bytes)
//! ```text
//! Bytes 0-3:  Version (3), big-endian i32
//! Bytes 4-7:  Root tag directory length, big-endian u32
//! Bytes 8-11: Byte order of tag data (0 = big-endian, 1 = little-endian)
//! ```
//!
//! ## DM4 (16 bytes)
//! ```text
//! Bytes 0-3:   Version (4), big-endian i32
//! Bytes 4-11:  Root tag directory length, big-endian u64
//! Bytes 12-15: Byte order of tag data (0 = big-endian, 1 = little-endian)
//! ```
//!
//! Structural fields (counts, name lengths, type info) are big-endian in
//! both generations. Only tag *values* follow the declared byte order.

use tracing::warn;

use crate::error::{DmError, FormatError};
use crate::io::ByteSource;

// =============================================================================
// Constants
// =============================================================================

/// Size of the DM3 header in bytes
pub const DM3_HEADER_SIZE: usize = 12;

/// Size of the DM4 header in bytes
pub const DM4_HEADER_SIZE: usize = 16;

/// Versions at or below this are treated as "a DM file we can't read"
/// rather than "not a DM file".
const MAX_PLAUSIBLE_VERSION: u32 = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order of tag values and pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

macro_rules! read_fn {
    ($name:ident, $ty:ty) => {
        #[inline]
        pub fn $name(self, bytes: &[u8]) -> $ty {
            const N: usize = std::mem::size_of::<$ty>();
            let mut raw = [0u8; N];
            raw.copy_from_slice(&bytes[..N]);
            match self {
                ByteOrder::LittleEndian => <$ty>::from_le_bytes(raw),
                ByteOrder::BigEndian => <$ty>::from_be_bytes(raw),
            }
        }
    };
}

impl ByteOrder {
    /// Map the header flag to a byte order.
    pub fn from_flag(flag: u32) -> Result<Self, FormatError> {
        match flag {
            0 => Ok(ByteOrder::BigEndian),
            1 => Ok(ByteOrder::LittleEndian),
            other => Err(FormatError::InvalidByteOrder(other)),
        }
    }

    read_fn!(read_u16, u16);
    read_fn!(read_i16, i16);
    read_fn!(read_u32, u32);
    read_fn!(read_i32, i32);
    read_fn!(read_u64, u64);
    read_fn!(read_i64, i64);
    read_fn!(read_f32, f32);
    read_fn!(read_f64, f64);
}

// =============================================================================
// FormatVersion
// =============================================================================

/// The two supported generations of the binary layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum FormatVersion {
    /// 4-byte counts and lengths
    Dm3,
    /// 8-byte counts and lengths, plus a length field on every entry
    Dm4,
}

impl FormatVersion {
    pub const fn number(self) -> u32 {
        match self {
            FormatVersion::Dm3 => 3,
            FormatVersion::Dm4 => 4,
        }
    }
}

// =============================================================================
// FormatHeader
// =============================================================================

/// Parsed DM file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FormatHeader {
    pub version: FormatVersion,

    /// Declared length of the root tag directory
    pub root_length: u64,

    /// Byte order for tag values and pixel data
    pub byte_order: ByteOrder,
}

impl FormatHeader {
    /// Parse a header from the first bytes of a file.
    ///
    /// # Arguments
    /// * `bytes` - Leading file bytes (16 is always enough)
    ///
    /// # Errors
    /// - `Truncated` if there aren't enough bytes for the header
    /// - `NotDigitalMicrograph` if the version field is not plausible
    /// - `UnsupportedVersion` for versions other than 3 and 4
    /// - `InvalidByteOrder` if the byte order flag is not 0 or 1
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < 4 {
            return Err(FormatError::Truncated {
                required: 4,
                actual: bytes.len() as u64,
            });
        }

        let raw_version = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let version = match raw_version {
            3 => FormatVersion::Dm3,
            4 => FormatVersion::Dm4,
            v @ 1..=MAX_PLAUSIBLE_VERSION => return Err(FormatError::UnsupportedVersion(v)),
            v => return Err(FormatError::NotDigitalMicrograph(v)),
        };

        let header = match version {
            FormatVersion::Dm3 => {
                require(bytes, DM3_HEADER_SIZE)?;
                let root_length = ByteOrder::BigEndian.read_u32(&bytes[4..8]) as u64;
                let flag = ByteOrder::BigEndian.read_u32(&bytes[8..12]);
                FormatHeader {
                    version,
                    root_length,
                    byte_order: ByteOrder::from_flag(flag)?,
                }
            }
            FormatVersion::Dm4 => {
                require(bytes, DM4_HEADER_SIZE)?;
                let root_length = ByteOrder::BigEndian.read_u64(&bytes[4..12]);
                let flag = ByteOrder::BigEndian.read_u32(&bytes[12..16]);
                FormatHeader {
                    version,
                    root_length,
                    byte_order: ByteOrder::from_flag(flag)?,
                }
            }
        };

        Ok(header)
    }

    /// Size of the header in bytes; the root directory starts right after it.
    #[inline]
    pub const fn header_size(&self) -> usize {
        match self.version {
            FormatVersion::Dm3 => DM3_HEADER_SIZE,
            FormatVersion::Dm4 => DM4_HEADER_SIZE,
        }
    }

    /// Width of directory counts, info counts and info words.
    ///
    /// DM3: 4 bytes
    /// DM4: 8 bytes
    #[inline]
    pub const fn count_width(&self) -> usize {
        match self.version {
            FormatVersion::Dm3 => 4,
            FormatVersion::Dm4 => 8,
        }
    }

    /// Whether each entry carries an 8-byte length after its name (DM4 only).
    #[inline]
    pub const fn has_entry_lengths(&self) -> bool {
        matches!(self.version, FormatVersion::Dm4)
    }
}

fn require(bytes: &[u8], required: usize) -> Result<(), FormatError> {
    if bytes.len() < required {
        return Err(FormatError::Truncated {
            required: required as u64,
            actual: bytes.len() as u64,
        });
    }
    Ok(())
}

/// Read and validate the header at the start of `source`.
pub fn parse_header<S: ByteSource + ?Sized>(source: &S) -> Result<FormatHeader, DmError> {
    let available = source.size().min(DM4_HEADER_SIZE as u64) as usize;
    let bytes = source.read_at(0, available)?;
    let header = FormatHeader::parse(&bytes)?;

    let expected = source.size().saturating_sub(header.header_size() as u64);
    if header.root_length > expected {
        warn!(
            source = source.identifier(),
            declared = header.root_length,
            available = expected,
            "root directory length exceeds file size"
        );
    }

    Ok(header)
}

// =============================================================================
// Tests
// =============================================================================
