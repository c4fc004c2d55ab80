//! # DM Reader
//!
//! A reader for Gatan DigitalMicrograph DM3 and DM4 files, the tag-tree
//! container written by electron-microscopy acquisition software.
//!
//! The library parses the self-describing tag tree once, locates the image
//! datasets inside it, and decodes them into typed `ndarray` arrays with
//! their per-axis calibration.
//!
//! ## Features
//!
//! - **Both generations**: DM3 (4-byte counts) and DM4 (8-byte counts) with
//!   either data byte order
//! - **Two access modes**: positioned file reads, or one upfront read into
//!   memory with zero-copy slicing afterwards
//! - **Lazy payloads**: bulk arrays are located during the tree walk but only
//!   read when a dataset is requested
//!
//! ## Architecture
//!
//! - [`io`] - Byte sources (file, memory) and the read-ahead cursor
//! - [`mod@format`] - Header, tag tree and dataset discovery
//! - [`dataset`] - Typed pixel arrays and dataset assembly
//! - [`reader`] - The [`DmFile`] session
//! - [`config`] - Read options and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use dm_reader::{DmFile, ReadOptions};
//!
//! let file = DmFile::open("image.dm3", &ReadOptions::default())?;
//! let dataset = file.dataset(0)?;
//! println!("{:?} in {:?}", dataset.shape(), dataset.pixel_unit);
//! # Ok::<(), dm_reader::DmError>(())
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod format;
pub mod io;
pub mod reader;

// Re-export commonly used types
pub use config::{
    BenchConfig, Cli, Command, DatasetConfig, InfoConfig, ReadOptions, SourceArgs, TagsConfig,
};
pub use dataset::{Dataset, PixelArray};
pub use error::{DecodeError, DmError, FormatError, IoError, ParseError, ParseErrorKind, Result};
pub use format::dm::{
    parse_header, ByteOrder, DatasetDescriptor, FormatHeader, FormatVersion, ImageDataType,
    Scalar, TagMap, TagTree, TagValue, Value,
};
pub use io::{open_source, AccessMode, ByteSource, FileSource, MemorySource};
pub use reader::DmFile;
