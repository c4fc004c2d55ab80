//! Dataset assembly.
//!
//! A [`Dataset`] is built fresh on every request from a
//! [`DatasetDescriptor`] and the payload bytes behind it. The caller owns the
//! result; nothing here is cached.

mod pixels;

pub use pixels::PixelArray;

use bytes::Bytes;
use tracing::debug;

use crate::error::{DmError, ParseError, ParseErrorKind};
use crate::format::dm::{ByteOrder, DatasetDescriptor, ImageDataType, MAX_DIMENSIONS};
use crate::io::ByteSource;

/// A decoded image with its calibration.
///
/// Calibration lists have one entry per array axis, slowest axis first.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub data: PixelArray,
    pub data_type: ImageDataType,
    pub pixel_size: Vec<f64>,
    pub pixel_unit: Vec<String>,
    pub pixel_origin: Vec<f64>,
    pub name: Option<String>,
}

impl Dataset {
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Read the undecoded payload described by `descriptor`.
///
/// # Errors
/// - `Parse` (`Overflow`) if the payload range cannot be addressed
/// - `Io` if the bytes cannot be read
pub fn read_payload<S: ByteSource + ?Sized>(
    descriptor: &DatasetDescriptor,
    source: &S,
) -> Result<Bytes, DmError> {
    let overflow = || DmError::from(ParseError::new(descriptor.offset, ParseErrorKind::Overflow));
    descriptor
        .offset
        .checked_add(descriptor.length)
        .ok_or_else(overflow)?;
    let len = usize::try_from(descriptor.length).map_err(|_| overflow())?;
    Ok(source.read_at(descriptor.offset, len)?)
}

/// Read and decode the pixels described by `descriptor`.
///
/// # Errors
/// - `Capability` if the dataset has more than four dimensions
/// - `Io` if the payload cannot be read
/// - `Parse` if the payload does not match the declared geometry
pub fn assemble<S: ByteSource + ?Sized>(
    descriptor: &DatasetDescriptor,
    source: &S,
    order: ByteOrder,
) -> Result<Dataset, DmError> {
    if descriptor.ndim() > MAX_DIMENSIONS {
        return Err(DmError::Capability {
            dimensions: descriptor.ndim(),
            max: MAX_DIMENSIONS,
        });
    }

    let bytes = read_payload(descriptor, source)?;
    let data = PixelArray::decode(
        descriptor.data_type,
        &descriptor.shape,
        &bytes,
        order,
        descriptor.offset,
    )?;

    debug!(
        index = descriptor.index,
        shape = ?descriptor.shape,
        bytes = bytes.len(),
        "assembled dataset"
    );

    Ok(Dataset {
        data,
        data_type: descriptor.data_type,
        pixel_size: descriptor.pixel_size.clone(),
        pixel_unit: descriptor.pixel_unit.clone(),
        pixel_origin: descriptor.pixel_origin.clone(),
        name: descriptor.name.clone(),
    })
}
