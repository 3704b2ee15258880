//! Encode/decode fixed-layout messages from canonical field definitions.
//!
//! Both directions are fail-soft. A value that cannot be converted is written as
//! zero bytes ([`Encoding::Filled`]); bytes that cannot be interpreted are shown
//! as a hex dump ([`DecodeStatus::Fallback`]). Numeric types honour each field's
//! endianness; string, bytes and padding are plain byte sequences.

use crate::dump::{format_binary, format_hex, hex_dump, label_enum};
use crate::error::{Result, SpecError};
use crate::schema::{Endian, FieldDefinition, FieldType, Format, MessageSchema, Spec};
use crate::value::{DecodeStatus, DecodedMessage, ParsedValue, Value};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io;

/// Why a field was zero-filled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeFailure {
    #[error("invalid {} literal: {:?}", .expected.as_str(), .literal)]
    InvalidLiteral { literal: String, expected: FieldType },
    #[error("invalid octet: {0:?}")]
    InvalidOctet(String),
}

/// Bytes produced for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    Ok(Vec<u8>),
    /// Conversion failed; the bytes are `byte_size` zeros.
    Filled(Vec<u8>, EncodeFailure),
}

impl Encoding {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Encoding::Ok(b) | Encoding::Filled(b, _) => b,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Encoding::Ok(b) | Encoding::Filled(b, _) => b,
        }
    }

    pub fn failure(&self) -> Option<&EncodeFailure> {
        match self {
            Encoding::Ok(_) => None,
            Encoding::Filled(_, cause) => Some(cause),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedField {
    /// `header.<name>` / `payload.<name>`.
    pub key: String,
    pub encoding: Encoding,
}

/// Encode a schema. `values` is keyed `header.<name>` / `payload.<name>`; missing
/// entries use the field's default `value`, then `"0"`. The result is always
/// `schema.total_size()` bytes long.
pub fn encode(schema: &MessageSchema, values: &HashMap<String, String>) -> Vec<u8> {
    let mut out = Vec::with_capacity(schema.total_size());
    for field in encode_fields(schema, values) {
        out.extend(field.encoding.into_bytes());
    }
    out
}

/// Per-field encoding results in wire order (header, then payload).
pub fn encode_fields(schema: &MessageSchema, values: &HashMap<String, String>) -> Vec<EncodedField> {
    let mut out = Vec::with_capacity(schema.header.len() + schema.payload.len());
    for (section, fields) in schema.sections() {
        for field in fields.iter().filter(|f| !f.is_reference()) {
            let key = section.key(&field.name);
            let encoding = encode_field(field, &key, values);
            if let Some(cause) = encoding.failure() {
                tracing::trace!(field = %key, %cause, "zero-filled field");
            }
            out.push(EncodedField { key, encoding });
        }
    }
    out
}

/// Encode one field. Bit sub-values are looked up as `<key>.<bit name>`.
pub fn encode_field(field: &FieldDefinition, key: &str, values: &HashMap<String, String>) -> Encoding {
    let size = field.byte_size();
    let literal = values
        .get(key)
        .map(String::as_str)
        .or(field.value.as_deref())
        .unwrap_or("0");
    let result = match field.field_type {
        FieldType::Padding => Ok(vec![0u8; size]),
        FieldType::String => Ok(fixed_width(&ascii_bytes(literal), size)),
        FieldType::Bytes => parse_octets(literal).map(|b| fixed_width(&b, size)),
        ty => number_bits(ty, literal, field.format)
            .and_then(|base| compose_bits(field, key, values, base))
            .map(|bits| match field.endian {
                Endian::Big => scalar_to_bytes::<BigEndian>(ty, bits),
                Endian::Little => scalar_to_bytes::<LittleEndian>(ty, bits),
            }),
    };
    match result {
        Ok(bytes) => Encoding::Ok(bytes),
        Err(cause) => Encoding::Filled(vec![0u8; size], cause),
    }
}

/// Overlay bit sub-values (caller value, else the bit's default) on `base`.
fn compose_bits(
    field: &FieldDefinition,
    key: &str,
    values: &HashMap<String, String>,
    base: u64,
) -> std::result::Result<u64, EncodeFailure> {
    let mut raw = base;
    for bit in field.bit_fields() {
        let literal = values
            .get(&format!("{}.{}", key, bit.name))
            .map(String::as_str)
            .or(bit.value.as_deref());
        if let Some(literal) = literal {
            let v = parse_int_bits(literal.trim(), Format::Decimal, 8, false).ok_or_else(|| {
                EncodeFailure::InvalidLiteral {
                    literal: literal.to_string(),
                    expected: field.field_type,
                }
            })?;
            raw = bit.insert(raw, v);
        }
    }
    Ok(raw)
}

/// Bit pattern of a numeric literal for `ty`.
fn number_bits(ty: FieldType, literal: &str, format: Format) -> std::result::Result<u64, EncodeFailure> {
    let text = literal.trim();
    let width = ty.fixed_size().unwrap_or(0);
    let decimal_float = format == Format::Decimal && strip_hex(text).is_none() && strip_bin(text).is_none();
    let bits = match ty {
        FieldType::Float if decimal_float => text.parse::<f32>().ok().map(|f| f.to_bits() as u64),
        FieldType::Double if decimal_float => text.parse::<f64>().ok().map(f64::to_bits),
        _ => parse_int_bits(text, format, width, ty.is_signed()),
    };
    bits.ok_or_else(|| EncodeFailure::InvalidLiteral {
        literal: literal.to_string(),
        expected: ty,
    })
}

fn strip_hex(text: &str) -> Option<&str> {
    text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
}

fn strip_bin(text: &str) -> Option<&str> {
    text.strip_prefix("0b").or_else(|| text.strip_prefix("0B"))
}

/// Parse an integer literal into a `width`-byte two's-complement pattern.
///
/// Hex and binary literals are bit patterns and must fit the width. Decimal
/// literals are range-checked against the signed or unsigned range; a decimal
/// field also accepts `0x`/`0b` prefixed literals.
pub fn parse_int_bits(text: &str, format: Format, width: usize, signed: bool) -> Option<u64> {
    let bits = (width * 8) as u32;
    if bits == 0 {
        return None;
    }
    let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let radix = |digits: &str, radix: u32| -> Option<u64> {
        let v = u64::from_str_radix(&digits.replace('_', ""), radix).ok()?;
        (v <= mask).then_some(v)
    };
    match format {
        Format::Hex => radix(strip_hex(text).unwrap_or(text), 16),
        Format::Binary => radix(strip_bin(text).unwrap_or(text), 2),
        Format::Decimal => {
            if let Some(h) = strip_hex(text) {
                return radix(h, 16);
            }
            if let Some(b) = strip_bin(text) {
                return radix(b, 2);
            }
            let v: i128 = text.parse().ok()?;
            let (min, max) = if signed {
                (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
            } else {
                (0, mask as i128)
            };
            if v < min || v > max {
                return None;
            }
            Some((v as u64) & mask)
        }
    }
}

fn scalar_to_bytes<B: ByteOrder>(ty: FieldType, bits: u64) -> Vec<u8> {
    let mut buf = vec![0u8; ty.fixed_size().unwrap_or(0)];
    match ty {
        FieldType::Byte | FieldType::Int8 => buf[0] = bits as u8,
        FieldType::Int16 => B::write_i16(&mut buf, bits as u16 as i16),
        FieldType::Uint16 => B::write_u16(&mut buf, bits as u16),
        FieldType::Int32 => B::write_i32(&mut buf, bits as u32 as i32),
        FieldType::Uint32 => B::write_u32(&mut buf, bits as u32),
        FieldType::Int64 => B::write_i64(&mut buf, bits as i64),
        FieldType::Uint64 => B::write_u64(&mut buf, bits),
        FieldType::Float => B::write_f32(&mut buf, f32::from_bits(bits as u32)),
        FieldType::Double => B::write_f64(&mut buf, f64::from_bits(bits)),
        FieldType::Padding | FieldType::String | FieldType::Bytes => {}
    }
    buf
}

fn scalar_from_bytes<B: ByteOrder>(ty: FieldType, mut r: &[u8]) -> io::Result<Value> {
    let value = match ty {
        FieldType::Byte => Value::U8(r.read_u8()?),
        FieldType::Int8 => Value::I8(r.read_i8()?),
        FieldType::Int16 => Value::I16(r.read_i16::<B>()?),
        FieldType::Uint16 => Value::U16(r.read_u16::<B>()?),
        FieldType::Int32 => Value::I32(r.read_i32::<B>()?),
        FieldType::Uint32 => Value::U32(r.read_u32::<B>()?),
        FieldType::Int64 => Value::I64(r.read_i64::<B>()?),
        FieldType::Uint64 => Value::U64(r.read_u64::<B>()?),
        FieldType::Float => Value::Float(r.read_f32::<B>()?),
        FieldType::Double => Value::Double(r.read_f64::<B>()?),
        FieldType::Padding | FieldType::String | FieldType::Bytes => {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a scalar type"))
        }
    };
    if !r.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "trailing bytes"));
    }
    Ok(value)
}

/// Non-ASCII characters become `?`.
fn ascii_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

/// Whitespace separated hex octets, each optionally `0x` prefixed.
fn parse_octets(text: &str) -> std::result::Result<Vec<u8>, EncodeFailure> {
    text.split_whitespace()
        .map(|tok| {
            let digits = strip_hex(tok).unwrap_or(tok);
            u8::from_str_radix(digits, 16).map_err(|_| EncodeFailure::InvalidOctet(tok.to_string()))
        })
        .collect()
}

fn fixed_width(bytes: &[u8], size: usize) -> Vec<u8> {
    let mut out = bytes[..bytes.len().min(size)].to_vec();
    out.resize(size, 0);
    out
}

/// Decode header then payload fields from `bytes`.
///
/// Decoding stops, without entries for the remaining fields, once the buffer is
/// exhausted. A field that only partially fits gets a `"N/A"` entry.
pub fn decode(bytes: &[u8], schema: &MessageSchema) -> DecodedMessage {
    let mut out = DecodedMessage::default();
    let mut offset = 0usize;
    for (section, fields) in schema.sections() {
        for field in fields.iter().filter(|f| !f.is_reference()) {
            if offset >= bytes.len() {
                return out;
            }
            let key = section.key(&field.name);
            let size = field.byte_size();
            let end = offset + size;
            let Some(raw) = bytes.get(offset..end) else {
                tracing::trace!(field = %key, needed = size, available = bytes.len() - offset, "truncated field");
                out.push(key, ParsedValue::not_available());
                offset = end;
                continue;
            };
            offset = end;
            let parsed = decode_field(field, raw);
            let storage = parsed.value.as_ref().and_then(Value::raw_bits);
            out.push(key.clone(), parsed);
            if let Some(storage) = storage {
                for bit in field.bit_fields() {
                    let v = bit.extract(storage);
                    let decimal = v.to_string();
                    out.push(
                        format!("{}.{}", key, bit.name),
                        ParsedValue {
                            raw: raw.to_vec(),
                            display: label_enum(decimal.clone(), &decimal, bit.enum_values.as_ref()),
                            value: Some(Value::U64(v)),
                            status: DecodeStatus::Ok,
                        },
                    );
                }
            }
        }
    }
    out
}

/// Interpret exactly `byte_size` bytes of one field.
pub fn decode_field(field: &FieldDefinition, raw: &[u8]) -> ParsedValue {
    match interpret(field, raw) {
        Ok(value) => {
            let decimal = value.to_string();
            let width = field.byte_size();
            let display = match (field.format, value.raw_bits()) {
                (Format::Hex, Some(bits)) => format_hex(bits, width),
                (Format::Binary, Some(bits)) => format_binary(bits, width),
                _ => decimal.clone(),
            };
            ParsedValue {
                raw: raw.to_vec(),
                display: label_enum(display, &decimal, field.enum_values.as_ref()),
                value: Some(value),
                status: DecodeStatus::Ok,
            }
        }
        Err(reason) => {
            tracing::trace!(field = %field.name, %reason, "showing raw bytes");
            ParsedValue {
                raw: raw.to_vec(),
                display: hex_dump(raw),
                value: None,
                status: DecodeStatus::Fallback(reason),
            }
        }
    }
}

fn interpret(field: &FieldDefinition, raw: &[u8]) -> std::result::Result<Value, String> {
    match field.field_type {
        FieldType::String => {
            if !raw.is_ascii() {
                return Err("non-ASCII string".to_string());
            }
            let text = String::from_utf8_lossy(raw);
            Ok(Value::Text(text.trim_end_matches('\0').to_string()))
        }
        FieldType::Bytes | FieldType::Padding => Ok(Value::Bytes(raw.to_vec())),
        ty => {
            let value = match field.endian {
                Endian::Big => scalar_from_bytes::<BigEndian>(ty, raw),
                Endian::Little => scalar_from_bytes::<LittleEndian>(ty, raw),
            };
            value.map_err(|e| format!("{} bytes as {}: {}", raw.len(), ty.as_str(), e))
        }
    }
}

/// Encode and decode messages of a [`Spec`] by name.
#[derive(Debug, Clone, Copy)]
pub struct Codec<'a> {
    spec: &'a Spec,
}

impl<'a> Codec<'a> {
    pub fn new(spec: &'a Spec) -> Self {
        Codec { spec }
    }

    pub fn request_schema(&self, message: &str) -> Result<&'a MessageSchema> {
        self.spec
            .message(message)
            .and_then(|m| m.request.as_ref())
            .ok_or_else(|| SpecError::Validation(format!("unknown message: {}", message)))
    }

    pub fn response_schema(&self, message: &str) -> Result<&'a MessageSchema> {
        self.spec
            .message(message)
            .ok_or_else(|| SpecError::Validation(format!("unknown message: {}", message)))?
            .response
            .as_ref()
            .ok_or_else(|| SpecError::Validation(format!("message {} has no response", message)))
    }

    pub fn encode_request(&self, message: &str, values: &HashMap<String, String>) -> Result<Vec<u8>> {
        Ok(encode(self.request_schema(message)?, values))
    }

    pub fn decode_request(&self, message: &str, bytes: &[u8]) -> Result<DecodedMessage> {
        Ok(decode(bytes, self.request_schema(message)?))
    }

    pub fn decode_response(&self, message: &str, bytes: &[u8]) -> Result<DecodedMessage> {
        Ok(decode(bytes, self.response_schema(message)?))
    }
}
