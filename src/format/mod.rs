//! Format parsers for electron-microscopy image files.
//!
//! Currently supported formats:
//!
//! - **DM3**: DigitalMicrograph tag files with 4-byte counts and lengths
//! - **DM4**: The same tag tree with 8-byte counts, lengths and per-entry sizes
//!
//! Both generations share one parser; see [`dm`].

pub mod dm;

pub use dm::{parse_header, FormatHeader, FormatVersion};
