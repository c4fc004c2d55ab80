//! Gatan DigitalMicrograph (DM3/DM4) format decoding.
//!
//! Reading a file happens in three passes over structures of increasing
//! size:
//!
//! 1. [`parse_header`] validates the fixed header and picks the layout
//!    generation and data byte order
//! 2. [`parse_tree`] walks the tag directory once, decoding small values and
//!    recording bulk arrays by position
//! 3. [`locate_datasets`] finds the image containers in the finished tree
//!
//! Pixel bytes are only read later, on request, through a
//! [`ByteSource`](crate::io::ByteSource).

pub mod codec;
mod header;
mod locate;
mod tag_map;
mod tree;
mod types;
mod value;


pub use header::{
    parse_header, ByteOrder, FormatHeader, FormatVersion, DM3_HEADER_SIZE, DM4_HEADER_SIZE,
};
pub use locate::{
    locate_datasets, DatasetDescriptor, ImageDataType, ImageIndex, IMAGE_LIST, MAX_DIMENSIONS,
};
pub use tag_map::TagMap;
pub use tree::{parse_tree, segment_label, TagEntry, TagGroup, TagNode, TagTree};
pub use types::{ElementLayout, ScalarType, TypeEncoding};
pub use value::{ArrayRef, ArraySummary, ArrayValues, Scalar, TagValue, Value};
