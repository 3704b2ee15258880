//! Decoded values: typed scalar, display text and decode status per field.

use crate::dump::hex_dump;
use std::fmt;

/// A single interpreted field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(x) => Some(*x as u64),
            Value::U16(x) => Some(*x as u64),
            Value::U32(x) => Some(*x as u64),
            Value::U64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(x) => Some(*x as i64),
            Value::I16(x) => Some(*x as i64),
            Value::I32(x) => Some(*x as i64),
            Value::I64(x) => Some(*x),
            Value::U8(x) => Some(*x as i64),
            Value::U16(x) => Some(*x as i64),
            Value::U32(x) => Some(*x as i64),
            Value::U64(x) => (*x).try_into().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x as f64),
            Value::Double(x) => Some(*x),
            _ => self.as_i64().map(|x| x as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Two's-complement / IEEE bit pattern of a numeric value.
    pub fn raw_bits(&self) -> Option<u64> {
        Some(match self {
            Value::U8(x) => *x as u64,
            Value::I8(x) => *x as u8 as u64,
            Value::U16(x) => *x as u64,
            Value::I16(x) => *x as u16 as u64,
            Value::U32(x) => *x as u64,
            Value::I32(x) => *x as u32 as u64,
            Value::U64(x) => *x,
            Value::I64(x) => *x as u64,
            Value::Float(x) => x.to_bits() as u64,
            Value::Double(x) => x.to_bits(),
            Value::Text(_) | Value::Bytes(_) => return None,
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U8(x) => write!(f, "{}", x),
            Value::I8(x) => write!(f, "{}", x),
            Value::U16(x) => write!(f, "{}", x),
            Value::I16(x) => write!(f, "{}", x),
            Value::U32(x) => write!(f, "{}", x),
            Value::I32(x) => write!(f, "{}", x),
            Value::U64(x) => write!(f, "{}", x),
            Value::I64(x) => write!(f, "{}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&hex_dump(b)),
        }
    }
}

/// How a field's display value was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStatus {
    Ok,
    /// Some bytes remained but fewer than the field needs; display is `"N/A"`.
    Truncated,
    /// Bytes could not be interpreted as the field type; display is a hex dump.
    Fallback(String),
}

/// Display text shown for a field that the buffer only partially covers.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    /// Bytes consumed for the field, in wire order. Bit entries carry their
    /// storage field's bytes.
    pub raw: Vec<u8>,
    pub display: String,
    pub value: Option<Value>,
    pub status: DecodeStatus,
}

impl ParsedValue {
    pub fn not_available() -> Self {
        ParsedValue {
            raw: Vec::new(),
            display: NOT_AVAILABLE.to_string(),
            value: None,
            status: DecodeStatus::Truncated,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == DecodeStatus::Ok
    }
}

/// Decoded fields keyed `header.<name>` / `payload.<name>`, in wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMessage {
    entries: Vec<(String, ParsedValue)>,
}

impl DecodedMessage {
    pub(crate) fn push(&mut self, key: String, value: ParsedValue) {
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&ParsedValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn display(&self, key: &str) -> Option<&str> {
        self.get(key).map(|v| v.display.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParsedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
