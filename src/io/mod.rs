//! Data-access layer.
//!
//! Everything that needs bytes from a DM file asks a [`ByteSource`] for an
//! `(offset, length)` range. The strategy is picked once, at open time:
//!
//! - [`FileSource`]: every request is a seek + read against the open file.
//!   Memory stays bounded, each access pays for the syscalls.
//! - [`MemorySource`]: the file is read into one buffer up front and every
//!   request is a zero-copy slice of it. Costs memory proportional to the
//!   file, but repeated dataset reads do no I/O at all.
//!
//! [`ReadAhead`] sits on top of either source and gives the tag-tree parser a
//! forward cursor that reads in windows.

mod file_source;
mod memory_source;
mod read_ahead;
mod source;

use std::fmt;
use std::path::Path;

pub use file_source::FileSource;
pub use memory_source::MemorySource;
pub use read_ahead::{ReadAhead, DEFAULT_READ_AHEAD};
pub use source::ByteSource;

use crate::error::IoError;

/// How an opened file serves byte ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AccessMode {
    /// Positioned reads against the open file for every request
    #[default]
    File,
    /// Read the whole file once and slice the buffer afterwards
    Memory,
}

impl AccessMode {
    pub const fn name(&self) -> &'static str {
        match self {
            AccessMode::File => "file",
            AccessMode::Memory => "memory",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Open `path` with the strategy selected by `mode`.
pub fn open_source(
    path: impl AsRef<Path>,
    mode: AccessMode,
) -> Result<Box<dyn ByteSource>, IoError> {
    Ok(match mode {
        AccessMode::File => Box::new(FileSource::open(path)?),
        AccessMode::Memory => Box::new(MemorySource::open(path)?),
    })
}
