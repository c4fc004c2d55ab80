//! Typed pixel arrays.

use ndarray::{ArrayD, IxDyn};

use crate::error::{DmError, ParseError, ParseErrorKind};
use crate::format::dm::{ByteOrder, ImageDataType};

/// A shaped array holding one of the supported pixel types.
///
/// Complex pixels are `[re, im]` pairs. RGB and RGBA pixels are both four
/// bytes (`[r, g, b, a]`); binary images are plain `u8`.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelArray {
    I8(ArrayD<i8>),
    U8(ArrayD<u8>),
    I16(ArrayD<i16>),
    U16(ArrayD<u16>),
    I32(ArrayD<i32>),
    U32(ArrayD<u32>),
    I64(ArrayD<i64>),
    U64(ArrayD<u64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    Complex64(ArrayD<[f32; 2]>),
    Complex128(ArrayD<[f64; 2]>),
    Rgba(ArrayD<[u8; 4]>),
}

macro_rules! each_variant {
    ($self:expr, $a:ident => $body:expr) => {
        match $self {
            PixelArray::I8($a) => $body,
            PixelArray::U8($a) => $body,
            PixelArray::I16($a) => $body,
            PixelArray::U16($a) => $body,
            PixelArray::I32($a) => $body,
            PixelArray::U32($a) => $body,
            PixelArray::I64($a) => $body,
            PixelArray::U64($a) => $body,
            PixelArray::F32($a) => $body,
            PixelArray::F64($a) => $body,
            PixelArray::Complex64($a) => $body,
            PixelArray::Complex128($a) => $body,
            PixelArray::Rgba($a) => $body,
        }
    };
}

impl PixelArray {
    /// Decode raw pixel bytes into an array of `shape`.
    ///
    /// `shape` is slowest axis first, so samples fill the array in row-major
    /// order exactly as they appear in the file. `offset` only locates
    /// errors.
    ///
    /// # Errors
    /// - `ParseError` if `bytes` does not hold exactly `shape` pixels
    pub fn decode(
        data_type: ImageDataType,
        shape: &[usize],
        bytes: &[u8],
        order: ByteOrder,
        offset: u64,
    ) -> Result<Self, DmError> {
        let count: usize = shape.iter().product();
        let expected = count.checked_mul(data_type.pixel_size());
        if expected != Some(bytes.len()) {
            return Err(ParseError::new(
                offset,
                ParseErrorKind::Inconsistent(format!(
                    "pixel block is {} bytes, shape {:?} of {:?} needs {:?}",
                    bytes.len(),
                    shape,
                    data_type,
                    expected
                )),
            )
            .into());
        }

        let dim = IxDyn(shape);
        let shaped = |e: ndarray::ShapeError| -> DmError {
            ParseError::new(offset, ParseErrorKind::Inconsistent(e.to_string())).into()
        };

        macro_rules! build {
            ($variant:ident, $n:expr, |$c:ident| $read:expr) => {
                PixelArray::$variant(
                    ArrayD::from_shape_vec(dim, bytes.chunks_exact($n).map(|$c| $read).collect())
                        .map_err(shaped)?,
                )
            };
        }

        let array = match data_type {
            ImageDataType::I8 => build!(I8, 1, |c| c[0] as i8),
            ImageDataType::U8 | ImageDataType::Binary => build!(U8, 1, |c| c[0]),
            ImageDataType::I16 => build!(I16, 2, |c| order.read_i16(c)),
            ImageDataType::U16 => build!(U16, 2, |c| order.read_u16(c)),
            ImageDataType::I32 => build!(I32, 4, |c| order.read_i32(c)),
            ImageDataType::U32 => build!(U32, 4, |c| order.read_u32(c)),
            ImageDataType::I64 => build!(I64, 8, |c| order.read_i64(c)),
            ImageDataType::U64 => build!(U64, 8, |c| order.read_u64(c)),
            ImageDataType::F32 => build!(F32, 4, |c| order.read_f32(c)),
            ImageDataType::F64 => build!(F64, 8, |c| order.read_f64(c)),
            ImageDataType::Complex64 => {
                build!(Complex64, 8, |c| [order.read_f32(c), order.read_f32(&c[4..])])
            }
            ImageDataType::Complex128 => {
                build!(Complex128, 16, |c| [order.read_f64(c), order.read_f64(&c[8..])])
            }
            ImageDataType::Rgb | ImageDataType::Rgba => build!(Rgba, 4, |c| [c[0], c[1], c[2], c[3]]),
        };
        Ok(array)
    }

    pub fn shape(&self) -> &[usize] {
        each_variant!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        each_variant!(self, a => a.ndim())
    }

    pub fn len(&self) -> usize {
        each_variant!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen a real-valued array to `f64`.
    ///
    /// Returns `None` for complex and RGB(A) pixels.
    pub fn to_f64(&self) -> Option<ArrayD<f64>> {
        let widened = match self {
            PixelArray::I8(a) => a.mapv(f64::from),
            PixelArray::U8(a) => a.mapv(f64::from),
            PixelArray::I16(a) => a.mapv(f64::from),
            PixelArray::U16(a) => a.mapv(f64::from),
            PixelArray::I32(a) => a.mapv(f64::from),
            PixelArray::U32(a) => a.mapv(f64::from),
            PixelArray::I64(a) => a.mapv(|v| v as f64),
            PixelArray::U64(a) => a.mapv(|v| v as f64),
            PixelArray::F32(a) => a.mapv(f64::from),
            PixelArray::F64(a) => a.clone(),
            PixelArray::Complex64(_) | PixelArray::Complex128(_) | PixelArray::Rgba(_) => {
                return None
            }
        };
        Some(widened)
    }
}
