//! Read sessions over a single DM file.
//!
//! [`DmFile`] owns the byte source for its whole lifetime. Opening parses the
//! header and the complete tag tree and locates every image; after that the
//! tree is read-only and each [`DmFile::dataset`] call reads one payload.
//!
//! # Example
//!
//! ```no_run
//! use dm_reader::{AccessMode, DmFile, ReadOptions};
//!
//! let file = DmFile::open("stack.dm4", &ReadOptions::new(AccessMode::Memory))?;
//! for i in 0..file.dataset_count() {
//!     let dataset = file.dataset(i)?;
//!     println!("{:?} {:?}", dataset.shape(), dataset.pixel_size);
//! }
//! # Ok::<(), dm_reader::DmError>(())
//! ```

use std::collections::HashSet;
use std::path::Path;

use bytes::Bytes;
use tracing::info;

use crate::config::ReadOptions;
use crate::dataset::{assemble, read_payload, Dataset};
use crate::error::{DmError, Result};
use crate::format::dm::{
    locate_datasets, parse_header, parse_tree, DatasetDescriptor, FormatHeader, ImageIndex,
    TagMap, TagTree,
};
use crate::io::{open_source, ByteSource};

/// An open DM3/DM4 file.
pub struct DmFile<S: ByteSource> {
    source: S,
    header: FormatHeader,
    tree: TagTree,
    images: ImageIndex,
}

impl DmFile<Box<dyn ByteSource>> {
    /// Open `path` with the access mode and parse options in `options`.
    ///
    /// # Errors
    /// - `Io` if the file cannot be opened or read
    /// - `Format` if it is not a supported DM file
    /// - `Parse` or `Decode` if the tag tree is corrupt
    pub fn open(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Self> {
        let path = path.as_ref();
        let source = open_source(path, options.mode)?;
        let file = Self::from_source(source, options)?;

        info!(
            path = %path.display(),
            mode = %options.mode,
            version = file.header.version.number(),
            datasets = file.dataset_count(),
            "opened DM file"
        );
        Ok(file)
    }
}

impl<S: ByteSource> DmFile<S> {
    /// Parse a file from an already opened source.
    ///
    /// On failure the source is dropped before returning.
    pub fn from_source(source: S, options: &ReadOptions) -> Result<Self> {
        let header = parse_header(&source)?;
        let tree = parse_tree(
            &source,
            &header,
            options.inline_array_limit,
            options.read_ahead,
        )?;
        let images = locate_datasets(&tree, &source, header.byte_order, options.skip_thumbnail)?;

        Ok(Self {
            source,
            header,
            tree,
            images,
        })
    }

    pub fn header(&self) -> &FormatHeader {
        &self.header
    }

    /// The parsed tag tree.
    pub fn tags(&self) -> &TagTree {
        &self.tree
    }

    /// Every tag keyed by path. Pixel payloads are reported by location only.
    ///
    /// Arrays the tree walk did not keep are read from the source.
    ///
    /// # Errors
    /// - `Io` if such an array cannot be read
    pub fn all_tags(&self) -> Result<TagMap> {
        let payloads: HashSet<u64> = self
            .images
            .thumbnail
            .iter()
            .chain(&self.images.datasets)
            .map(|d| d.offset)
            .collect();
        TagMap::from_tree(&self.tree, &self.source, self.header.byte_order, |entry| {
            entry
                .value
                .as_array()
                .is_some_and(|array| payloads.contains(&array.offset))
        })
    }

    pub fn dataset_count(&self) -> usize {
        self.images.datasets.len()
    }

    pub fn descriptors(&self) -> &[DatasetDescriptor] {
        &self.images.datasets
    }

    /// Descriptor of dataset `index`.
    pub fn descriptor(&self, index: usize) -> Result<&DatasetDescriptor> {
        self.images.datasets.get(index).ok_or(DmError::Index {
            index,
            count: self.images.datasets.len(),
        })
    }

    /// Whether a leading preview image was set aside.
    pub fn has_thumbnail(&self) -> bool {
        self.images.thumbnail.is_some()
    }

    pub fn thumbnail(&self) -> Option<&DatasetDescriptor> {
        self.images.thumbnail.as_ref()
    }

    /// Read and decode dataset `index`.
    ///
    /// # Errors
    /// - `Index` if `index >= dataset_count()`
    /// - `Capability` if the dataset has more than four dimensions
    /// - `Io` if the payload cannot be read
    pub fn dataset(&self, index: usize) -> Result<Dataset> {
        let descriptor = self.descriptor(index)?;
        assemble(descriptor, &self.source, self.header.byte_order)
    }

    /// Undecoded payload bytes of dataset `index`.
    ///
    /// In memory mode this is a slice of the file buffer; in file mode it is a
    /// fresh read.
    pub fn raw_data(&self, index: usize) -> Result<Bytes> {
        read_payload(self.descriptor(index)?, &self.source)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Release the source and any buffer it holds.
    pub fn close(self) {
        drop(self);
    }
}
