//! Image dataset discovery.
//!
//! A DM file keeps its images in the root `ImageList` directory. Each child of
//! that list is an image container; not all containers hold pixel data, and
//! when several do, the first is usually a small preview written for file
//! browsers.
//!
//! # Container Layout
//!
//! ```text
//! ImageList.<n>
//!   Name                                  UTF-16 text (optional)
//!   ImageData
//!     Data                                pixel payload (array)
//!     DataType                            pixel type code
//!     Dimensions.<i>                      extents, fastest axis first
//!     Calibrations.Dimension.<i>
//!       Origin, Scale                     f32
//!       Units                             UTF-16 text
//! ```
//!
//! Descriptors come from the parsed tree. The only reads are for text the
//! walk skipped, such as long names; pixel bytes are never touched here.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{DecodeError, DmError, ParseError, ParseErrorKind};
use crate::io::ByteSource;

use super::codec::load_text;
use super::header::ByteOrder;
use super::tree::{TagEntry, TagGroup, TagTree};

// =============================================================================
// Constants
// =============================================================================

/// Root directory holding image containers
pub const IMAGE_LIST: &str = "ImageList";

/// Highest dimensionality a dataset can be assembled with
pub const MAX_DIMENSIONS: usize = 4;

const DATA_PATH: &str = "ImageData.Data";
const DATA_TYPE_PATH: &str = "ImageData.DataType";
const DIMENSIONS_PATH: &str = "ImageData.Dimensions";
const CALIBRATION_PATH: &str = "ImageData.Calibrations.Dimension";

// =============================================================================
// ImageDataType
// =============================================================================

/// Pixel element type declared by `ImageData.DataType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDataType {
    I16,
    F32,
    Complex64,
    U8,
    I32,
    /// Packed as 4 bytes per pixel
    Rgb,
    I8,
    U16,
    U32,
    F64,
    Complex128,
    /// One byte per pixel, 0 or 1
    Binary,
    Rgba,
    I64,
    U64,
}

impl ImageDataType {
    /// Map a DataType code to a pixel type.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(ImageDataType::I16),
            2 => Some(ImageDataType::F32),
            3 => Some(ImageDataType::Complex64),
            6 => Some(ImageDataType::U8),
            7 => Some(ImageDataType::I32),
            8 => Some(ImageDataType::Rgb),
            9 => Some(ImageDataType::I8),
            10 => Some(ImageDataType::U16),
            11 => Some(ImageDataType::U32),
            12 => Some(ImageDataType::F64),
            13 => Some(ImageDataType::Complex128),
            14 => Some(ImageDataType::Binary),
            23 => Some(ImageDataType::Rgba),
            39 => Some(ImageDataType::I64),
            40 => Some(ImageDataType::U64),
            _ => None,
        }
    }

    pub const fn code(self) -> u64 {
        match self {
            ImageDataType::I16 => 1,
            ImageDataType::F32 => 2,
            ImageDataType::Complex64 => 3,
            ImageDataType::U8 => 6,
            ImageDataType::I32 => 7,
            ImageDataType::Rgb => 8,
            ImageDataType::I8 => 9,
            ImageDataType::U16 => 10,
            ImageDataType::U32 => 11,
            ImageDataType::F64 => 12,
            ImageDataType::Complex128 => 13,
            ImageDataType::Binary => 14,
            ImageDataType::Rgba => 23,
            ImageDataType::I64 => 39,
            ImageDataType::U64 => 40,
        }
    }

    /// Bytes per pixel.
    pub const fn pixel_size(self) -> usize {
        match self {
            ImageDataType::I8 | ImageDataType::U8 | ImageDataType::Binary => 1,
            ImageDataType::I16 | ImageDataType::U16 => 2,
            ImageDataType::I32
            | ImageDataType::U32
            | ImageDataType::F32
            | ImageDataType::Rgb
            | ImageDataType::Rgba => 4,
            ImageDataType::I64
            | ImageDataType::U64
            | ImageDataType::F64
            | ImageDataType::Complex64 => 8,
            ImageDataType::Complex128 => 16,
        }
    }
}

// =============================================================================
// DatasetDescriptor
// =============================================================================

/// Geometry, calibration and payload location of one image.
///
/// Axis order is slowest-varying first, so `shape[0]` is the outermost
/// axis of a row-major array and `pixel_size[i]`, `pixel_unit[i]` and
/// `pixel_origin[i]` all describe axis `i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetDescriptor {
    /// Position among the public datasets
    pub index: usize,

    /// Position of the container in `ImageList`
    pub container: usize,

    pub name: Option<String>,
    pub data_type: ImageDataType,
    pub shape: Vec<usize>,
    pub pixel_size: Vec<f64>,
    pub pixel_unit: Vec<String>,
    pub pixel_origin: Vec<f64>,

    /// File offset of the pixel payload
    pub offset: u64,

    /// Payload length in bytes
    pub length: u64,
}

impl DatasetDescriptor {
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of pixels.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Tag path of the container, e.g. `ImageList.1`.
    pub fn container_path(&self) -> String {
        format!("{}.{}", IMAGE_LIST, self.container)
    }
}

/// Every image found in a tree, split into the preview and the public list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageIndex {
    pub thumbnail: Option<DatasetDescriptor>,
    pub datasets: Vec<DatasetDescriptor>,
}

// =============================================================================
// Discovery
// =============================================================================

/// Find every image container in the tree, in child order.
///
/// With `skip_thumbnail`, the first image becomes the thumbnail when more
/// than one image exists; public indices then start after it. Names and
/// units whose arrays were not kept by the walk are read from `source`.
///
/// # Errors
/// - `DecodeError` for an unknown `DataType` code
/// - `ParseError` if an image's declared geometry disagrees with its payload
/// - `Io` if a skipped name or unit cannot be read
pub fn locate_datasets<S: ByteSource + ?Sized>(
    tree: &TagTree,
    source: &S,
    order: ByteOrder,
    skip_thumbnail: bool,
) -> Result<ImageIndex, DmError> {
    let Some(list) = tree.root().group(IMAGE_LIST) else {
        debug!("no {} directory, file holds no images", IMAGE_LIST);
        return Ok(ImageIndex::default());
    };

    let mut images = Vec::new();
    for (container, child) in list.children.iter().enumerate() {
        let Some(group) = child.as_group() else {
            warn!(container, "skipping non-directory entry in {}", IMAGE_LIST);
            continue;
        };
        match describe(group, container, source, order)? {
            Some(descriptor) => images.push(descriptor),
            None => warn!(container, "skipping container without image data"),
        }
    }

    let thumbnail = if skip_thumbnail && images.len() > 1 {
        Some(images.remove(0))
    } else {
        None
    };
    for (index, descriptor) in images.iter_mut().enumerate() {
        descriptor.index = index;
        debug!(
            index,
            container = descriptor.container,
            shape = ?descriptor.shape,
            data_type = ?descriptor.data_type,
            offset = descriptor.offset,
            "located dataset"
        );
    }

    Ok(ImageIndex {
        thumbnail,
        datasets: images,
    })
}

/// Build a descriptor for one container, or `None` if it holds no image.
fn describe<S: ByteSource + ?Sized>(
    group: &TagGroup,
    container: usize,
    source: &S,
    order: ByteOrder,
) -> Result<Option<DatasetDescriptor>, DmError> {
    let Some(payload) = group.value(DATA_PATH).and_then(|v| v.as_array()) else {
        return Ok(None);
    };
    let Some(dimensions) = group.group(DIMENSIONS_PATH) else {
        return Ok(None);
    };

    let inconsistent = |message: String| -> DmError {
        ParseError::new(payload.offset, ParseErrorKind::Inconsistent(message)).into()
    };

    let code = group
        .value(DATA_TYPE_PATH)
        .and_then(|v| v.as_scalar())
        .and_then(|s| s.as_u64())
        .ok_or_else(|| inconsistent("image has no integer DataType".to_string()))?;
    let data_type = ImageDataType::from_code(code).ok_or(DecodeError {
        code,
        offset: payload.offset,
        context: "image data type",
    })?;

    // Extents as listed in the file: fastest axis first
    let mut extents = Vec::with_capacity(dimensions.children.len());
    for child in &dimensions.children {
        let extent = child
            .as_entry()
            .and_then(|e| e.value.as_scalar())
            .and_then(|s| s.as_u64())
            .ok_or_else(|| inconsistent("image dimension is not a non-negative integer".into()))?;
        extents.push(usize::try_from(extent).map_err(|_| overflow(payload.offset))?);
    }
    if extents.is_empty() {
        return Err(inconsistent("image declares no dimensions".to_string()));
    }

    let expected = extents
        .iter()
        .try_fold(data_type.pixel_size() as u64, |acc, &n| acc.checked_mul(n as u64))
        .ok_or_else(|| overflow(payload.offset))?;
    if expected != payload.length {
        return Err(inconsistent(format!(
            "payload is {} bytes, dimensions {:?} of {:?} need {}",
            payload.length, extents, data_type, expected
        )));
    }

    let calibrations = group.group(CALIBRATION_PATH);
    let mut pixel_size = Vec::with_capacity(extents.len());
    let mut pixel_unit = Vec::with_capacity(extents.len());
    let mut pixel_origin = Vec::with_capacity(extents.len());
    for axis in 0..extents.len() {
        let calibration = calibrations.and_then(|c| c.group(&axis.to_string()));
        let origin = calibration_number(calibration, "Origin").unwrap_or(0.0);
        let scale = calibration_number(calibration, "Scale").unwrap_or(1.0);
        let unit = match calibration.and_then(|c| c.value("Units")) {
            Some(value) => load_text(value, source, order)?.unwrap_or_default(),
            None => String::new(),
        };

        pixel_size.push(scale);
        pixel_unit.push(unit);
        // Written as 0 - x so a zero origin stays +0.0
        pixel_origin.push(0.0 - origin * scale);
    }

    // Slowest axis first
    extents.reverse();
    pixel_size.reverse();
    pixel_unit.reverse();
    pixel_origin.reverse();

    let name = match group.value("Name") {
        Some(value) => load_text(value, source, order)?,
        None => None,
    };

    Ok(Some(DatasetDescriptor {
        index: 0,
        container,
        name,
        data_type,
        shape: extents,
        pixel_size,
        pixel_unit,
        pixel_origin,
        offset: payload.offset,
        length: payload.length,
    }))
}

fn calibration_number(calibration: Option<&TagGroup>, key: &str) -> Option<f64> {
    calibration?
        .get(key)?
        .as_entry()
        .and_then(|e: &TagEntry| e.value.as_scalar())
        .map(|s| s.as_f64())
}

fn overflow(offset: u64) -> DmError {
    ParseError::new(offset, ParseErrorKind::Overflow).into()
}

// =============================================================================
// Tests
// =============================================================================
