use std::fmt;

use thiserror::Error;

/// I/O errors that can occur when reading from a byte source
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error reported by the operating system
    #[error("I/O error on {identifier}: {message}")]
    Os {
        identifier: String,
        kind: std::io::ErrorKind,
        message: String,
    },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// The file handle lock was poisoned by a panic in another thread
    #[error("File handle for {0} is poisoned")]
    Poisoned(String),
}

impl IoError {
    /// Wrap a `std::io::Error` raised while accessing `identifier`.
    pub fn os(identifier: impl Into<String>, err: std::io::Error) -> Self {
        IoError::Os {
            identifier: identifier.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// The underlying `io::ErrorKind`, if this error came from the OS.
    pub fn kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            IoError::Os { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Errors raised while validating the fixed file header.
///
/// These mean the file is not (or not a supported version of) a
/// DigitalMicrograph file, as opposed to a DM file with a damaged tag tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The version field does not look like a DigitalMicrograph file at all
    #[error("Not a DigitalMicrograph file: version field is 0x{0:08X}")]
    NotDigitalMicrograph(u32),

    /// Looks like a DigitalMicrograph file, but of a generation we cannot read
    #[error("Unsupported DigitalMicrograph version: {0} (only DM3 and DM4 are supported)")]
    UnsupportedVersion(u32),

    /// The byte order flag is neither 0 (big-endian) nor 1 (little-endian)
    #[error("Invalid byte order flag: expected 0 or 1, got {0}")]
    InvalidByteOrder(u32),

    /// File is too small to contain the header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    Truncated { required: u64, actual: u64 },
}

/// What went wrong while walking the tag tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A read needed more bytes than remain in the file
    UnexpectedEof { needed: u64, available: u64 },

    /// A directory declared a negative number of entries
    NegativeCount(i64),

    /// A declared count or length cannot fit in the remaining bytes
    LengthExceedsFile { declared: u64, available: u64 },

    /// Entry marker was neither a tag nor a tag group
    InvalidMarker(u8),

    /// The `%%%%` delimiter in front of a tag's type info is missing
    MissingDelimiter([u8; 4]),

    /// The type info list does not have the length its layout requires
    MalformedTypeInfo { expected: u64, actual: u64 },

    /// A size computation overflowed
    Overflow,

    /// Derived geometry disagrees with the bytes declared for it
    Inconsistent(String),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::UnexpectedEof { needed, available } => write!(
                f,
                "unexpected end of file: needed {} bytes, {} available",
                needed, available
            ),
            ParseErrorKind::NegativeCount(count) => write!(f, "negative entry count {}", count),
            ParseErrorKind::LengthExceedsFile {
                declared,
                available,
            } => write!(
                f,
                "declared length {} exceeds the {} bytes remaining",
                declared, available
            ),
            ParseErrorKind::InvalidMarker(marker) => {
                write!(f, "invalid entry marker {} (expected 20 or 21)", marker)
            }
            ParseErrorKind::MissingDelimiter(found) => {
                write!(f, "missing '%%%%' tag delimiter, found {:02X?}", found)
            }
            ParseErrorKind::MalformedTypeInfo { expected, actual } => write!(
                f,
                "malformed type info: expected {} words, got {}",
                expected, actual
            ),
            ParseErrorKind::Overflow => write!(f, "size computation overflowed"),
            ParseErrorKind::Inconsistent(message) => write!(f, "{}", message),
        }
    }
}

/// Structural corruption found in the tag tree, with the byte offset of failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Parse error at offset {offset}: {kind}")]
pub struct ParseError {
    pub offset: u64,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(offset: u64, kind: ParseErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// An unknown or unsupported type code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported {context} type code {code} at offset {offset}")]
pub struct DecodeError {
    pub code: u64,
    pub offset: u64,
    pub context: &'static str,
}

/// Top-level error for every public operation of the crate.
#[derive(Debug, Clone, Error)]
pub enum DmError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Recognized but unsupported request
    #[error("Dataset has {dimensions} dimensions, at most {max} are supported")]
    Capability { dimensions: usize, max: usize },

    /// Dataset index outside the discovered range
    #[error("Dataset index {index} out of range ({count} datasets)")]
    Index { index: usize, count: usize },

    #[error(transparent)]
    Io(#[from] IoError),
}

impl DmError {
    /// Byte offset of failure, for errors that carry one.
    pub fn offset(&self) -> Option<u64> {
        match self {
            DmError::Parse(e) => Some(e.offset),
            DmError::Decode(e) => Some(e.offset),
            _ => None,
        }
    }
}

/// A convenience `Result` alias using [`DmError`].
pub type Result<T> = std::result::Result<T, DmError>;
