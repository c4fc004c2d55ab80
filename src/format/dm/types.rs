//! Type codes used in tag type-info lists.
//!
//! Every tag carries a short list of info words that describe how its value
//! is laid out. The first word is a type code. Scalars stop there; structs,
//! strings and arrays carry extra words that describe their members and
//! lengths.
//!
//! ```text
//! scalar:            [code]
//! struct:            [15, name_len, n_fields, (field_name_len, field_code) * n_fields]
//! string:            [18, length]
//! array of scalars:  [20, element_code, count]
//! array of structs:  [20, 15, name_len, n_fields, (field_name_len, field_code) * n_fields, count]
//! ```

use serde::Serialize;

use crate::error::{DecodeError, DmError, ParseError, ParseErrorKind};

// =============================================================================
// Type Codes
// =============================================================================

/// Composite type code for structs
pub const STRUCT_CODE: u64 = 15;

/// Composite type code for strings
pub const STRING_CODE: u64 = 18;

/// Composite type code for arrays
pub const ARRAY_CODE: u64 = 20;

// =============================================================================
// ScalarType
// =============================================================================

/// Fixed-width primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ScalarType {
    I16 = 2,
    I32 = 3,
    U16 = 4,
    U32 = 5,
    F32 = 6,
    F64 = 7,
    Bool = 8,
    I8 = 9,
    U8 = 10,
    I64 = 11,
    U64 = 12,
}

impl ScalarType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::F64 | ScalarType::I64 | ScalarType::U64 => 8,
        }
    }

    /// Create a ScalarType from its numeric code.
    ///
    /// Returns `None` for composite or unknown codes.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            2 => Some(ScalarType::I16),
            3 => Some(ScalarType::I32),
            4 => Some(ScalarType::U16),
            5 => Some(ScalarType::U32),
            6 => Some(ScalarType::F32),
            7 => Some(ScalarType::F64),
            8 => Some(ScalarType::Bool),
            9 => Some(ScalarType::I8),
            10 => Some(ScalarType::U8),
            11 => Some(ScalarType::I64),
            12 => Some(ScalarType::U64),
            _ => None,
        }
    }

    pub const fn code(self) -> u64 {
        self as u8 as u64
    }
}

// =============================================================================
// Encodings
// =============================================================================

/// Layout of one array element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ElementLayout {
    Scalar(ScalarType),
    Struct(Vec<ScalarType>),
}

impl ElementLayout {
    /// Bytes occupied by one element.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            ElementLayout::Scalar(ty) => ty.size_in_bytes(),
            ElementLayout::Struct(fields) => fields.iter().map(|f| f.size_in_bytes()).sum(),
        }
    }
}

/// Decoded type-info list of a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeEncoding {
    Scalar(ScalarType),
    Struct(Vec<ScalarType>),
    /// UTF-16 text of `length` code units
    String { length: u64 },
    Array { element: ElementLayout, count: u64 },
}

impl TypeEncoding {
    /// Interpret a tag's info words.
    ///
    /// `offset` is the file offset of the info list and is attached to any
    /// error so a failure can be located.
    ///
    /// # Errors
    /// - `DecodeError` for unknown codes, or composites nested where the
    ///   format does not allow them
    /// - `ParseError` if the list has the wrong number of words for its layout
    pub fn parse(info: &[u64], offset: u64) -> Result<Self, DmError> {
        let Some(&code) = info.first() else {
            return Err(malformed(offset, 1, 0));
        };

        match code {
            STRUCT_CODE => {
                let fields = parse_struct_fields(info, 0, offset)?;
                expect_len(info, 3 + 2 * fields.len() as u64, offset)?;
                Ok(TypeEncoding::Struct(fields))
            }
            STRING_CODE => {
                expect_len(info, 2, offset)?;
                Ok(TypeEncoding::String { length: info[1] })
            }
            ARRAY_CODE => {
                let element_code = *info.get(1).ok_or_else(|| malformed(offset, 3, 1))?;
                match element_code {
                    STRUCT_CODE => {
                        let fields = parse_struct_fields(info, 1, offset)?;
                        let expected = 4 + 2 * fields.len() as u64 + 1;
                        expect_len(info, expected, offset)?;
                        Ok(TypeEncoding::Array {
                            element: ElementLayout::Struct(fields),
                            count: info[expected as usize - 1],
                        })
                    }
                    other => {
                        let ty = ScalarType::from_code(other).ok_or(DecodeError {
                            code: other,
                            offset,
                            context: "array element",
                        })?;
                        expect_len(info, 3, offset)?;
                        Ok(TypeEncoding::Array {
                            element: ElementLayout::Scalar(ty),
                            count: info[2],
                        })
                    }
                }
            }
            other => {
                let ty = ScalarType::from_code(other).ok_or(DecodeError {
                    code: other,
                    offset,
                    context: "tag",
                })?;
                expect_len(info, 1, offset)?;
                Ok(TypeEncoding::Scalar(ty))
            }
        }
    }

    /// Total payload size in bytes, if it fits in a `u64`.
    pub fn payload_size(&self) -> Option<u64> {
        match self {
            TypeEncoding::Scalar(ty) => Some(ty.size_in_bytes() as u64),
            TypeEncoding::Struct(fields) => {
                Some(fields.iter().map(|f| f.size_in_bytes() as u64).sum())
            }
            TypeEncoding::String { length } => length.checked_mul(2),
            TypeEncoding::Array { element, count } => {
                count.checked_mul(element.size_in_bytes() as u64)
            }
        }
    }
}

/// Read the struct member list starting at `info[base]` (which holds code 15).
fn parse_struct_fields(info: &[u64], base: usize, offset: u64) -> Result<Vec<ScalarType>, DmError> {
    // [15, name_len, n_fields, ...]
    let n_fields = *info
        .get(base + 2)
        .ok_or_else(|| malformed(offset, base as u64 + 3, info.len() as u64))?;

    let needed = (base as u64 + 3).saturating_add(n_fields.saturating_mul(2));
    if needed > info.len() as u64 {
        return Err(malformed(offset, needed, info.len() as u64));
    }

    let mut fields = Vec::with_capacity(n_fields as usize);
    for i in 0..n_fields as usize {
        let code = info[base + 3 + 2 * i + 1];
        let ty = ScalarType::from_code(code).ok_or(DecodeError {
            code,
            offset,
            context: "struct field",
        })?;
        fields.push(ty);
    }
    Ok(fields)
}

fn expect_len(info: &[u64], expected: u64, offset: u64) -> Result<(), DmError> {
    if info.len() as u64 != expected {
        return Err(malformed(offset, expected, info.len() as u64));
    }
    Ok(())
}

fn malformed(offset: u64, expected: u64, actual: u64) -> DmError {
    ParseError::new(offset, ParseErrorKind::MalformedTypeInfo { expected, actual }).into()
}

// =============================================================================
// Tests
// =============================================================================
