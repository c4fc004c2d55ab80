//! Decoding of tag values.
//!
//! Values follow the byte order declared in the header. Each call consumes
//! exactly the bytes of one value so the tree walk stays in sync with the
//! file; arrays are the exception to "decode", not to "consume": they are
//! recorded by position and skipped unless small enough to keep.

use crate::error::{DmError, ParseError, ParseErrorKind};
use crate::io::{ByteSource, ReadAhead};

use super::header::ByteOrder;
use super::types::{ElementLayout, ScalarType, TypeEncoding};
use super::value::{ArrayRef, ArrayValues, Scalar, TagValue};

impl Scalar {
    /// Decode one value of type `ty` from the start of `bytes`.
    ///
    /// # Panics
    /// Panics if `bytes` is shorter than `ty.size_in_bytes()`.
    pub fn decode(ty: ScalarType, bytes: &[u8], order: ByteOrder) -> Scalar {
        match ty {
            ScalarType::I8 => Scalar::I8(bytes[0] as i8),
            ScalarType::U8 => Scalar::U8(bytes[0]),
            ScalarType::Bool => Scalar::Bool(bytes[0] != 0),
            ScalarType::I16 => Scalar::I16(order.read_i16(bytes)),
            ScalarType::U16 => Scalar::U16(order.read_u16(bytes)),
            ScalarType::I32 => Scalar::I32(order.read_i32(bytes)),
            ScalarType::U32 => Scalar::U32(order.read_u32(bytes)),
            ScalarType::I64 => Scalar::I64(order.read_i64(bytes)),
            ScalarType::U64 => Scalar::U64(order.read_u64(bytes)),
            ScalarType::F32 => Scalar::F32(order.read_f32(bytes)),
            ScalarType::F64 => Scalar::F64(order.read_f64(bytes)),
        }
    }
}

/// Decode consecutive struct fields from `bytes`.
pub fn decode_struct(fields: &[ScalarType], bytes: &[u8], order: ByteOrder) -> Vec<Scalar> {
    let mut pos = 0;
    fields
        .iter()
        .map(|&ty| {
            let value = Scalar::decode(ty, &bytes[pos..], order);
            pos += ty.size_in_bytes();
            value
        })
        .collect()
}

/// Decode `bytes` as a packed array of `element`.
pub fn decode_array(element: &ElementLayout, bytes: &[u8], order: ByteOrder) -> ArrayValues {
    let stride = element.size_in_bytes();
    if stride == 0 {
        return ArrayValues::Scalars(Vec::new());
    }
    match element {
        ElementLayout::Scalar(ty) => ArrayValues::Scalars(
            bytes
                .chunks_exact(stride)
                .map(|chunk| Scalar::decode(*ty, chunk, order))
                .collect(),
        ),
        ElementLayout::Struct(fields) => ArrayValues::Records(
            bytes
                .chunks_exact(stride)
                .map(|chunk| decode_struct(fields, chunk, order))
                .collect(),
        ),
    }
}

/// Decode UTF-16 code units stored in `order`.
pub fn decode_utf16(bytes: &[u8], order: ByteOrder) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| order.read_u16(chunk))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Values of `array`, reading them from `source` if the walk skipped them.
///
/// # Errors
/// - `ParseError` if the array length does not fit in memory
/// - `Io` if the bytes cannot be read
pub fn load_array<S: ByteSource + ?Sized>(
    array: &ArrayRef,
    source: &S,
    order: ByteOrder,
) -> Result<ArrayValues, DmError> {
    if let Some(values) = &array.values {
        return Ok(values.clone());
    }
    let len = usize::try_from(array.length)
        .map_err(|_| ParseError::new(array.offset, ParseErrorKind::Overflow))?;
    let bytes = source.read_at(array.offset, len)?;
    Ok(decode_array(&array.element, &bytes, order))
}

/// Text of a string tag or `u16` array, loading skipped arrays from `source`.
pub fn load_text<S: ByteSource + ?Sized>(
    value: &TagValue,
    source: &S,
    order: ByteOrder,
) -> Result<Option<String>, DmError> {
    match value {
        TagValue::Text(text) => Ok(Some(text.clone())),
        TagValue::Array(array) => Ok(load_array(array, source, order)?.as_text()),
        _ => Ok(None),
    }
}

/// Read the value described by `encoding` at the cursor.
///
/// Scalars, structs and strings are decoded inline. Arrays are captured as
/// an [`ArrayRef`]; their bytes are kept (and decoded) only when the payload
/// is at most `retain_limit` bytes, otherwise the cursor skips over them.
///
/// # Errors
/// - `ParseError` if the value's bytes run past the end of the file or its
///   size overflows
pub fn read_value<S: ByteSource + ?Sized>(
    cursor: &mut ReadAhead<'_, S>,
    encoding: &TypeEncoding,
    order: ByteOrder,
    retain_limit: usize,
) -> Result<TagValue, DmError> {
    let offset = cursor.position();
    let length = encoding
        .payload_size()
        .ok_or_else(|| ParseError::new(offset, ParseErrorKind::Overflow))?;

    if length > cursor.remaining() {
        return Err(ParseError::new(
            offset,
            ParseErrorKind::LengthExceedsFile {
                declared: length,
                available: cursor.remaining(),
            },
        )
        .into());
    }

    match encoding {
        TypeEncoding::Scalar(ty) => {
            let bytes = cursor.take(ty.size_in_bytes())?;
            Ok(TagValue::Scalar(Scalar::decode(*ty, &bytes, order)))
        }
        TypeEncoding::Struct(fields) => {
            let bytes = cursor.take(length as usize)?;
            Ok(TagValue::Struct(decode_struct(fields, &bytes, order)))
        }
        TypeEncoding::String { .. } => {
            let bytes = cursor.take(length as usize)?;
            Ok(TagValue::Text(decode_utf16(&bytes, order)))
        }
        TypeEncoding::Array { element, count } => {
            let values = if length <= retain_limit as u64 {
                let bytes = cursor.take(length as usize)?;
                Some(decode_array(element, &bytes, order))
            } else {
                cursor.skip(length)?;
                None
            };
            Ok(TagValue::Array(ArrayRef {
                element: element.clone(),
                count: *count,
                offset,
                length,
                values,
            }))
        }
    }
}
