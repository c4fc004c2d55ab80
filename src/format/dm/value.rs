//! Decoded tag values.

use serde::Serialize;

use super::types::{ElementLayout, ScalarType};

/// One decoded primitive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
}

impl Scalar {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::I8(_) => ScalarType::I8,
            Scalar::U8(_) => ScalarType::U8,
            Scalar::I16(_) => ScalarType::I16,
            Scalar::U16(_) => ScalarType::U16,
            Scalar::I32(_) => ScalarType::I32,
            Scalar::U32(_) => ScalarType::U32,
            Scalar::I64(_) => ScalarType::I64,
            Scalar::U64(_) => ScalarType::U64,
            Scalar::F32(_) => ScalarType::F32,
            Scalar::F64(_) => ScalarType::F64,
            Scalar::Bool(_) => ScalarType::Bool,
        }
    }

    /// Numeric value widened to `f64` (`true` is 1).
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::I8(v) => v as f64,
            Scalar::U8(v) => v as f64,
            Scalar::I16(v) => v as f64,
            Scalar::U16(v) => v as f64,
            Scalar::I32(v) => v as f64,
            Scalar::U32(v) => v as f64,
            Scalar::I64(v) => v as f64,
            Scalar::U64(v) => v as f64,
            Scalar::F32(v) => v as f64,
            Scalar::F64(v) => v,
            Scalar::Bool(v) => u8::from(v) as f64,
        }
    }

    /// Value as an unsigned integer, for integer types holding a non-negative value.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Scalar::I8(v) => u64::try_from(v).ok(),
            Scalar::U8(v) => Some(v as u64),
            Scalar::I16(v) => u64::try_from(v).ok(),
            Scalar::U16(v) => Some(v as u64),
            Scalar::I32(v) => u64::try_from(v).ok(),
            Scalar::U32(v) => Some(v as u64),
            Scalar::I64(v) => u64::try_from(v).ok(),
            Scalar::U64(v) => Some(v),
            Scalar::F32(_) | Scalar::F64(_) | Scalar::Bool(_) => None,
        }
    }
}

/// Decoded contents of an array tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArrayValues {
    Scalars(Vec<Scalar>),
    Records(Vec<Vec<Scalar>>),
}

impl ArrayValues {
    /// Interpret a `u16` array as UTF-16 text.
    ///
    /// DM stores most strings this way. Returns `None` for any other
    /// element type.
    pub fn as_text(&self) -> Option<String> {
        let ArrayValues::Scalars(values) = self else {
            return None;
        };
        let units = values
            .iter()
            .map(|v| match v {
                Scalar::U16(unit) => Some(*unit),
                _ => None,
            })
            .collect::<Option<Vec<u16>>>()?;
        Some(String::from_utf16_lossy(&units))
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayValues::Scalars(v) => v.len(),
            ArrayValues::Records(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where an array's bytes live, plus the values for small arrays.
///
/// `offset` and `length` always locate the payload in the file. `values` is
/// filled only for arrays no larger than the parser's retain limit; bulk
/// arrays such as pixel data are skipped during the walk and fetched later
/// through a [`ByteSource`](crate::io::ByteSource).
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayRef {
    pub element: ElementLayout,
    pub count: u64,
    pub offset: u64,
    pub length: u64,
    pub values: Option<ArrayValues>,
}

impl ArrayRef {
    pub fn summary(&self) -> ArraySummary {
        ArraySummary {
            element: self.element.clone(),
            count: self.count,
            offset: self.offset,
            length: self.length,
        }
    }

    /// Text content, when the array is retained and made of `u16` units.
    pub fn text(&self) -> Option<String> {
        self.values.as_ref().and_then(ArrayValues::as_text)
    }
}

/// Location and shape of an array whose values were not loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArraySummary {
    pub element: ElementLayout,
    pub count: u64,
    pub offset: u64,
    pub length: u64,
}

/// Value held by a leaf of the tag tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Scalar(Scalar),
    Struct(Vec<Scalar>),
    Text(String),
    Array(ArrayRef),
}

impl TagValue {
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            TagValue::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            TagValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Text from either a string tag or a retained `u16` array.
    ///
    /// [`load_text`](super::codec::load_text) also covers arrays the walk skipped.
    pub fn as_text(&self) -> Option<String> {
        match self {
            TagValue::Text(s) => Some(s.clone()),
            TagValue::Array(a) => a.text(),
            _ => None,
        }
    }
}

/// Entry of the all-tags view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Struct(Vec<Scalar>),
    Text(String),
    Array(ArrayValues),
    Unread(ArraySummary),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(s) => Some(s.as_f64()),
            _ => None,
        }
    }
}

impl From<&TagValue> for Value {
    fn from(value: &TagValue) -> Self {
        match value {
            TagValue::Scalar(s) => Value::Scalar(*s),
            TagValue::Struct(fields) => Value::Struct(fields.clone()),
            TagValue::Text(s) => Value::Text(s.clone()),
            TagValue::Array(array) => match &array.values {
                Some(values) => Value::Array(values.clone()),
                None => Value::Unread(array.summary()),
            },
        }
    }
}
