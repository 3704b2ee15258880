//! Canonical message model shared by both notations and consumed by the codec.
//!
//! A [`Spec`] owns messages (request/response [`MessageSchema`]s) and an optional
//! [`Components`] namespace of reusable field lists addressed by `$ref` strings.

use crate::error::{Result, SpecError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";
pub const HEADER_REF_PREFIX: &str = "#/components/headers/";

/// Version string written to the `udpapi` key of new documents.
pub const SPEC_VERSION: &str = "1.0";

/// Default message timeout when a document does not set `timeoutMs`.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Wire type of a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Byte,
    Int8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Double,
    Padding,
    String,
    Bytes,
}

impl FieldType {
    /// Width of fixed-size types; `None` for padding/string/bytes, which use `size`.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            FieldType::Byte | FieldType::Int8 => Some(1),
            FieldType::Int16 | FieldType::Uint16 => Some(2),
            FieldType::Int32 | FieldType::Uint32 | FieldType::Float => Some(4),
            FieldType::Int64 | FieldType::Uint64 | FieldType::Double => Some(8),
            FieldType::Padding | FieldType::String | FieldType::Bytes => None,
        }
    }

    /// Size given to a variable-width field that is created without one.
    pub fn default_size(self) -> Option<usize> {
        match self {
            FieldType::Padding => Some(1),
            FieldType::String => Some(16),
            FieldType::Bytes => Some(4),
            _ => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::Byte
                | FieldType::Int8
                | FieldType::Int16
                | FieldType::Uint16
                | FieldType::Int32
                | FieldType::Uint32
                | FieldType::Int64
                | FieldType::Uint64
        )
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, FieldType::Float | FieldType::Double)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Byte => "byte",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Uint16 => "uint16",
            FieldType::Int32 => "int32",
            FieldType::Uint32 => "uint32",
            FieldType::Int64 => "int64",
            FieldType::Uint64 => "uint64",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Padding => "padding",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Little,
    /// Network byte order.
    #[default]
    Big,
}

/// How a field's literal value is written and how its decoded value is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Decimal,
    Hex,
    Binary,
}

/// A named bit range inside an integer storage field.
///
/// Exactly one of `single_bit` / `bit_range` is expected; with neither set the
/// definition covers bit 0. Bits are numbered LSB-first within the storage value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BitFieldDefinition {
    pub name: String,
    #[serde(rename = "bit", default, skip_serializing_if = "Option::is_none")]
    pub single_bit: Option<u32>,
    /// `"start:end"`, inclusive.
    #[serde(rename = "bits", default, skip_serializing_if = "Option::is_none")]
    pub bit_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<BTreeMap<String, String>>,
}

impl BitFieldDefinition {
    pub fn single(name: impl Into<String>, bit: u32) -> Self {
        BitFieldDefinition {
            name: name.into(),
            single_bit: Some(bit),
            ..Default::default()
        }
    }

    pub fn range(name: impl Into<String>, start: u32, end: u32) -> Self {
        BitFieldDefinition {
            name: name.into(),
            bit_range: Some(format!("{}:{}", start, end)),
            ..Default::default()
        }
    }

    fn bounds(&self) -> (u32, u32) {
        if let Some(range) = self.bit_range.as_deref() {
            if let Some((a, b)) = range.split_once(':') {
                if let (Ok(a), Ok(b)) = (a.trim().parse::<u32>(), b.trim().parse::<u32>()) {
                    return (a.min(b).min(63), a.max(b).min(63));
                }
            } else if let Ok(a) = range.trim().parse::<u32>() {
                return (a.min(63), a.min(63));
            }
        }
        match self.single_bit {
            Some(b) => (b.min(63), b.min(63)),
            None => (0, 0),
        }
    }

    pub fn start_bit(&self) -> u32 {
        self.bounds().0
    }

    pub fn end_bit(&self) -> u32 {
        self.bounds().1
    }

    pub fn bit_size(&self) -> u32 {
        let (start, end) = self.bounds();
        end - start + 1
    }

    pub fn max_value(&self) -> u64 {
        let n = self.bit_size();
        if n >= 64 {
            u64::MAX
        } else {
            (1u64 << n) - 1
        }
    }

    /// Mask of this field's bits within the storage value.
    pub fn bit_mask(&self) -> u64 {
        self.max_value() << self.start_bit()
    }

    pub fn extract(&self, raw: u64) -> u64 {
        (raw >> self.start_bit()) & self.max_value()
    }

    /// Replace this field's bits in `raw` with `value` (masked to `max_value`).
    pub fn insert(&self, raw: u64, value: u64) -> u64 {
        (raw & !self.bit_mask()) | ((value & self.max_value()) << self.start_bit())
    }
}

/// One field of a message schema, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// Default literal used when the caller supplies no value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Total byte count for padding/string/bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default)]
    pub endian: Endian,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub format: Format,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<Vec<BitFieldDefinition>>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub component_ref: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldDefinition {
            name: name.into(),
            ..Default::default()
        }
        .retyped(field_type)
    }

    /// A placeholder entry that resolves to a component's field list.
    pub fn reference(reference: impl Into<String>) -> Self {
        FieldDefinition {
            component_ref: Some(reference.into()),
            ..Default::default()
        }
    }

    /// Change the type and recompute everything that depends on it.
    ///
    /// Fixed-width types drop `size`; variable-width types keep an explicit size or
    /// take the type's default. Bit definitions only survive on integer types.
    pub fn retyped(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self.size = match field_type.fixed_size() {
            Some(_) => None,
            None => self.size.or(field_type.default_size()),
        };
        if !field_type.is_integer() {
            self.bits = None;
        }
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Only meaningful for variable-width types; ignored otherwise.
    pub fn with_size(mut self, size: usize) -> Self {
        if self.field_type.fixed_size().is_none() {
            self.size = Some(size);
        }
        self
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_enum<K, V>(mut self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.enum_values = Some(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Ignored unless the field has an integer type.
    pub fn with_bits(mut self, bits: Vec<BitFieldDefinition>) -> Self {
        if self.field_type.is_integer() {
            self.bits = Some(bits);
        }
        self
    }

    /// Wire width in bytes. Unresolved `$ref` placeholders occupy no bytes.
    pub fn byte_size(&self) -> usize {
        if self.is_reference() {
            return 0;
        }
        self.field_type
            .fixed_size()
            .unwrap_or_else(|| self.size.unwrap_or(0))
    }

    pub fn is_reference(&self) -> bool {
        self.component_ref.as_deref().is_some_and(|r| !r.is_empty())
    }

    pub fn bit_fields(&self) -> &[BitFieldDefinition] {
        self.bits.as_deref().unwrap_or(&[])
    }
}

/// Which list of a [`MessageSchema`] a field belongs to; also the value-key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Header,
    Payload,
}

impl Section {
    pub fn prefix(self) -> &'static str {
        match self {
            Section::Header => "header",
            Section::Payload => "payload",
        }
    }

    /// `header.<name>` / `payload.<name>`.
    pub fn key(self, field_name: &str) -> String {
        format!("{}.{}", self.prefix(), field_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageSchema {
    #[serde(default)]
    pub header: Vec<FieldDefinition>,
    #[serde(default)]
    pub payload: Vec<FieldDefinition>,
}

impl MessageSchema {
    pub fn new(header: Vec<FieldDefinition>, payload: Vec<FieldDefinition>) -> Self {
        MessageSchema { header, payload }
    }

    pub fn total_size(&self) -> usize {
        self.header
            .iter()
            .chain(self.payload.iter())
            .map(FieldDefinition::byte_size)
            .sum()
    }

    /// Both field lists in wire order.
    pub fn sections(&self) -> [(Section, &[FieldDefinition]); 2] {
        [
            (Section::Header, self.header.as_slice()),
            (Section::Payload, self.payload.as_slice()),
        ]
    }
}

/// Where a message is sent: a named server from `servers`, or an inline address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDefinition {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    /// Required; `None` only survives until [`Spec::validate`].
    #[serde(default)]
    pub request: Option<MessageSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<MessageSchema>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for MessageDefinition {
    fn default() -> Self {
        MessageDefinition {
            description: String::new(),
            group: None,
            endpoint: None,
            request: Some(MessageSchema::default()),
            response: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl MessageDefinition {
    pub fn new(request: MessageSchema) -> Self {
        MessageDefinition {
            request: Some(request),
            ..Default::default()
        }
    }

    /// `(ip, port)` from the inline address, or from the referenced server.
    pub fn resolve_endpoint(&self, spec: &Spec) -> Option<(String, u16)> {
        let endpoint = self.endpoint.as_ref()?;
        if let (Some(ip), Some(port)) = (endpoint.ip.as_ref(), endpoint.port) {
            return Some((ip.clone(), port));
        }
        let server = spec.server(endpoint.server.as_deref()?)?;
        Some((server.ip.clone(), server.port))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComponentSchema {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, ComponentSchema>,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<FieldDefinition>>,
}

impl Components {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.headers.is_empty()
    }

    /// Field list addressed by a `#/components/...` reference.
    pub fn lookup(&self, reference: &str) -> Option<&[FieldDefinition]> {
        if let Some(name) = reference.strip_prefix(SCHEMA_REF_PREFIX) {
            return self.schemas.get(name).map(|s| s.fields.as_slice());
        }
        if let Some(name) = reference.strip_prefix(HEADER_REF_PREFIX) {
            return self.headers.get(name).map(Vec::as_slice);
        }
        None
    }
}

/// Document root.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Spec {
    #[serde(rename = "udpapi", default)]
    pub version: String,
    #[serde(default)]
    pub info: Info,
    #[serde(default)]
    pub servers: Vec<ServerInfo>,
    #[serde(default)]
    pub messages: BTreeMap<String, MessageDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl Spec {
    pub fn validate(&self) -> Result<()> {
        if self.info.title.trim().is_empty() {
            return Err(SpecError::Validation("info.title must not be empty".to_string()));
        }
        for (name, message) in &self.messages {
            if message.request.is_none() {
                return Err(SpecError::Validation(format!(
                    "message {}: missing request",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Splice component field lists in place of `$ref` entries of every request and
    /// response. Single pass: refs inside the spliced lists are not expanded again.
    pub fn resolve_references(&mut self) {
        let Some(components) = self.components.as_ref() else {
            return;
        };
        for message in self.messages.values_mut() {
            for schema in message.request.iter_mut().chain(message.response.iter_mut()) {
                resolve_field_list(&mut schema.header, components);
                resolve_field_list(&mut schema.payload, components);
            }
        }
    }

    pub fn message(&self, name: &str) -> Option<&MessageDefinition> {
        self.messages.get(name)
    }

    pub fn messages_in_group<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a MessageDefinition)> + 'a {
        self.messages
            .iter()
            .filter(move |(_, m)| m.group.as_deref() == Some(group))
    }

    pub fn server(&self, name: &str) -> Option<&ServerInfo> {
        self.servers.iter().find(|s| s.name == name)
    }
}

/// Replace each `$ref` entry of `fields` by the referenced list. Unknown refs stay.
pub fn resolve_field_list(fields: &mut Vec<FieldDefinition>, components: &Components) {
    if !fields.iter().any(FieldDefinition::is_reference) {
        return;
    }
    let mut out = Vec::with_capacity(fields.len());
    for field in fields.drain(..) {
        let resolved = field
            .component_ref
            .as_deref()
            .filter(|r| !r.is_empty())
            .and_then(|r| components.lookup(r));
        match resolved {
            Some(list) => out.extend(list.iter().cloned()),
            None => {
                if let Some(r) = field.component_ref.as_deref().filter(|r| !r.is_empty()) {
                    tracing::warn!(reference = r, "unresolved component reference");
                }
                out.push(field);
            }
        }
    }
    *fields = out;
}
