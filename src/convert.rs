//! Conversion between the IDL AST and the canonical [`Spec`].
//!
//! [`lower`] flattens structs into canonical field lists. [`raise`] writes a
//! `Spec` back as IDL text; it is lossy (synthetic header, renumbered ids,
//! scalar-only fields), so the two are not inverses. One `raise`/`lower` cycle
//! is stable.

use crate::ast::{group_fields, FieldGroup, IdlDocument, IdlField, StructDef};
use crate::parser::ID_MARKER;
use crate::schema::{
    BitFieldDefinition, ComponentSchema, Components, Endian, FieldDefinition, Info,
    MessageDefinition, MessageSchema, Spec, SPEC_VERSION,
};
use crate::types::PrimitiveType;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

/// Name of the header component produced from the `//$()$` struct.
pub const COMMON_HEADER: &str = "CommonHeader";

const DEFAULT_TITLE: &str = "IDL Import";
const INFO_VERSION: &str = "1.0.0";

/// Message key for a lowered message struct: `Msg_0001_Ping`.
pub fn message_key(id: u32, name: &str) -> String {
    format!("Msg_{:04}_{}", id, name)
}

/// Build a [`Spec`] from a parsed IDL document. `source_name` (usually the file
/// stem) becomes the title.
pub fn lower(doc: &IdlDocument, source_name: &str) -> Spec {
    let endian = doc.directives.endian();
    let source = source_name.trim();
    let title = if source.is_empty() { DEFAULT_TITLE } else { source };
    let header = doc.header_struct();

    let mut components = Components::default();
    for s in doc.user_structs() {
        if components.schemas.contains_key(&s.name) {
            continue;
        }
        components.schemas.insert(
            s.name.clone(),
            ComponentSchema {
                description: s.comment.clone(),
                fields: lower_fields(doc, s, endian),
            },
        );
    }
    if let Some(h) = header {
        components
            .headers
            .insert(COMMON_HEADER.to_string(), lower_header(doc, h, endian, None));
    }

    let mut messages = BTreeMap::new();
    for s in doc.message_structs() {
        let Some((id, id_text)) = s.message_id() else {
            continue;
        };
        let mut request = MessageSchema::default();
        for group in group_fields(&s.fields) {
            match (group, header) {
                (FieldGroup::Single(f), Some(h)) if f.is_struct() && f.type_name == h.name => {
                    request.header.extend(lower_header(doc, h, endian, Some(id_text)));
                }
                (group, _) => {
                    request
                        .payload
                        .extend(lower_group(doc, &group, "", endian, &mut HashSet::new()));
                }
            }
        }
        let key = message_key(id, &s.name);
        let definition = MessageDefinition {
            description: s.comment.clone(),
            ..MessageDefinition::new(request)
        };
        if messages.insert(key.clone(), definition).is_some() {
            tracing::warn!(key = %key, "duplicate message; keeping the last declaration");
        }
    }

    let d = doc.directives;
    Spec {
        version: SPEC_VERSION.to_string(),
        info: Info {
            title: title.to_string(),
            description: format!(
                "Imported from {} (PACK_SIZE={}, MOST_BYTE={})",
                if source.is_empty() { "IDL" } else { source },
                d.pack_size,
                d.big_endian
            ),
            version: INFO_VERSION.to_string(),
            contact: None,
        },
        servers: Vec::new(),
        messages,
        components: (!components.is_empty()).then_some(components),
    }
}

fn lower_fields<'a>(doc: &'a IdlDocument, s: &'a StructDef, endian: Endian) -> Vec<FieldDefinition> {
    let mut visiting = HashSet::new();
    visiting.insert(s.name.as_str());
    group_fields(&s.fields)
        .iter()
        .flat_map(|g| lower_group(doc, g, "", endian, &mut visiting))
        .collect()
}

/// Header fields; with `id_text`, the message-id field gets it as its value.
fn lower_header<'a>(
    doc: &'a IdlDocument,
    h: &'a StructDef,
    endian: Endian,
    id_text: Option<&str>,
) -> Vec<FieldDefinition> {
    let mut visiting = HashSet::new();
    visiting.insert(h.name.as_str());
    let mut out = Vec::new();
    for group in group_fields(&h.fields) {
        let mut lowered = lower_group(doc, &group, "", endian, &mut visiting);
        if let (FieldGroup::Single(f), Some(id)) = (&group, id_text) {
            if is_message_id_field(f) {
                if let Some(first) = lowered.first_mut() {
                    first.value = Some(id.to_string());
                }
            }
        }
        out.extend(lowered);
    }
    out
}

fn is_message_id_field(f: &IdlField) -> bool {
    f.is_message_id || f.name == "MsgID" || f.name == "msgId"
}

fn lower_group<'a>(
    doc: &'a IdlDocument,
    group: &FieldGroup<'a>,
    prefix: &str,
    endian: Endian,
    visiting: &mut HashSet<&'a str>,
) -> Vec<FieldDefinition> {
    match group {
        FieldGroup::Bits(members) => lower_bits(members, prefix, endian).into_iter().collect(),
        FieldGroup::Single(f) if f.is_struct() => lower_nested(doc, f, prefix, endian, visiting),
        FieldGroup::Single(f) => {
            let Some(ty) = f.primitive.canonical() else {
                return Vec::new();
            };
            let base = |name: String| FieldDefinition::new(name, ty).with_endian(endian);
            match f.array_size {
                None => vec![base(format!("{}{}", prefix, f.name)).with_description(f.comment.as_str())],
                Some(n) => (0..n)
                    .map(|i| {
                        let field = base(format!("{}{}[{}]", prefix, f.name, i));
                        if i == 0 {
                            field.with_description(f.comment.as_str())
                        } else {
                            field
                        }
                    })
                    .collect(),
            }
        }
    }
}

/// One storage field for a run of packed bit fields, members LSB-first.
fn lower_bits(members: &[&IdlField], prefix: &str, endian: Endian) -> Option<FieldDefinition> {
    let ty = members.first()?.primitive.canonical()?;
    let name = members.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join("_");
    let mut start = 0u32;
    let bits = members
        .iter()
        .map(|m| {
            let width = m.bit_field_size.unwrap_or(1).max(1);
            let mut bit = if width == 1 {
                BitFieldDefinition::single(m.name.as_str(), start)
            } else {
                BitFieldDefinition::range(m.name.as_str(), start, start + width - 1)
            };
            bit.description = m.comment.clone();
            start += width;
            bit
        })
        .collect();
    Some(
        FieldDefinition::new(format!("{}{}", prefix, name), ty)
            .with_endian(endian)
            .with_bits(bits),
    )
}

fn lower_nested<'a>(
    doc: &'a IdlDocument,
    f: &IdlField,
    prefix: &str,
    endian: Endian,
    visiting: &mut HashSet<&'a str>,
) -> Vec<FieldDefinition> {
    let Some(s) = doc.get_struct(&f.type_name) else {
        tracing::warn!(field = %f.name, type_name = %f.type_name, "unknown struct type; field skipped");
        return Vec::new();
    };
    if !visiting.insert(s.name.as_str()) {
        tracing::warn!(field = %f.name, type_name = %f.type_name, "recursive struct reference; field skipped");
        return Vec::new();
    }
    let count = f.count();
    let groups = group_fields(&s.fields);
    let mut out = Vec::new();
    for i in 0..count {
        let inner = if count > 1 {
            format!("{}{}[{}].", prefix, f.name, i)
        } else {
            format!("{}{}.", prefix, f.name)
        };
        for g in &groups {
            out.extend(lower_group(doc, g, &inner, endian, visiting));
        }
    }
    visiting.remove(s.name.as_str());
    out
}

/// Write a [`Spec`] as IDL text.
///
/// Emits a fixed `MsgHeader` struct, one struct per component schema and one
/// message struct per message (ids renumbered from 1 in key order) holding only
/// the request payload.
pub fn raise(spec: &Spec) -> String {
    let big_endian = first_endian(spec) != Some(Endian::Little);
    let mut out = String::new();
    let _ = writeln!(out, "//+PACK_SIZE=1");
    let _ = writeln!(out, "//+MOST_BYTE={}", big_endian);
    out.push('\n');
    let _ = writeln!(out, "struct MsgHeader {}", ID_MARKER);
    out.push_str("{\n");
    let _ = writeln!(out, "    unsigned short MsgID; {}", ID_MARKER);
    out.push_str("    unsigned short Length;\n");
    out.push_str("};\n");

    if let Some(components) = &spec.components {
        for (name, schema) in &components.schemas {
            out.push('\n');
            let _ = writeln!(out, "struct {}{}", sanitize(name), trailing_comment(&schema.description));
            write_body(&mut out, &schema.fields);
        }
    }

    for (i, (key, message)) in spec.messages.iter().enumerate() {
        out.push('\n');
        let _ = writeln!(
            out,
            "struct {} //$({})${}",
            sanitize(strip_message_prefix(key)),
            i + 1,
            trailing_comment(&message.description)
        );
        let payload = message.request.as_ref().map(|r| r.payload.as_slice()).unwrap_or(&[]);
        write_body(&mut out, payload);
    }
    out
}

fn first_endian(spec: &Spec) -> Option<Endian> {
    let components = spec.components.iter().flat_map(|c| {
        c.schemas
            .values()
            .flat_map(|s| s.fields.iter())
            .chain(c.headers.values().flatten())
    });
    let messages = spec.messages.values().flat_map(|m| {
        m.request
            .iter()
            .flat_map(|r| r.header.iter().chain(r.payload.iter()))
    });
    components
        .chain(messages)
        .find(|f| !f.is_reference())
        .map(|f| f.endian)
}

fn write_body(out: &mut String, fields: &[FieldDefinition]) {
    out.push_str("{\n");
    for field in fields {
        write_field(out, field);
    }
    out.push_str("};\n");
}

fn write_field(out: &mut String, field: &FieldDefinition) {
    if field.is_reference() {
        tracing::debug!(reference = ?field.component_ref, "unresolved reference not exported");
        return;
    }
    let name = sanitize(&field.name);
    let ty = PrimitiveType::idl_name(field.field_type);
    if field.field_type.fixed_size().is_none() {
        for i in 0..field.byte_size() {
            let comment = if i == 0 { trailing_comment(&field.description) } else { String::new() };
            let _ = writeln!(out, "    {} {}_{};{}", ty, name, i, comment);
        }
        return;
    }
    let bits = storage_bits(field);
    if bits.is_empty() {
        let _ = writeln!(out, "    {} {};{}", ty, name, trailing_comment(&field.description));
        return;
    }
    // Fill gaps and unused high bits so the unit re-imports with its own width.
    let width = (field.byte_size() * 8) as u32;
    let mut cursor = 0u32;
    for bit in bits {
        if bit.start_bit() > cursor {
            let _ = writeln!(out, "    {} _pad{} : {};", ty, cursor, bit.start_bit() - cursor);
        }
        let _ = writeln!(
            out,
            "    {} {} : {};{}",
            ty,
            sanitize(&bit.name),
            bit.bit_size(),
            trailing_comment(&bit.description)
        );
        cursor = bit.end_bit() + 1;
    }
    if cursor < width {
        let _ = writeln!(out, "    {} _pad{} : {};", ty, cursor, width - cursor);
    }
}

/// Bit members of an integer storage field that fit its width, ordered by start
/// bit. Overlapping members are dropped.
fn storage_bits(field: &FieldDefinition) -> Vec<&BitFieldDefinition> {
    if !field.field_type.is_integer() {
        return Vec::new();
    }
    let width = (field.byte_size() * 8) as u32;
    let mut bits: Vec<_> = field.bit_fields().iter().collect();
    bits.sort_by_key(|b| b.start_bit());
    let mut cursor = 0u32;
    bits.retain(|b| {
        let keep = b.start_bit() >= cursor && b.end_bit() < width;
        if keep {
            cursor = b.end_bit() + 1;
        } else {
            tracing::debug!(field = %field.name, bit = %b.name, "bit member not exported");
        }
        keep
    });
    bits
}

fn trailing_comment(text: &str) -> String {
    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.is_empty() {
        String::new()
    } else {
        format!(" // {}", line)
    }
}

/// Identifier-safe name: every character outside `[A-Za-z0-9_]` becomes `_`.
pub fn sanitize(name: &str) -> String {
    let s: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if s.is_empty() {
        "unnamed".to_string()
    } else {
        s
    }
}

/// `Msg_0001_Ping` -> `Ping`; other keys unchanged.
fn strip_message_prefix(key: &str) -> &str {
    let Some(rest) = key.strip_prefix("Msg_") else {
        return key;
    };
    match rest.split_once('_') {
        Some((digits, name))
            if !digits.is_empty() && !name.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            name
        }
        _ => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::schema::FieldType;

    #[test]
    fn message_prefix_is_stripped() {
        assert_eq!(strip_message_prefix("Msg_0001_Ping"), "Ping");
        assert_eq!(strip_message_prefix("Msg_Ping"), "Msg_Ping");
        assert_eq!(strip_message_prefix("Ping"), "Ping");
        assert_eq!(strip_message_prefix("Msg_12_"), "Msg_12_");
    }

    #[test]
    fn names_are_identifier_safe() {
        assert_eq!(sanitize("pt[0].x"), "pt_0__x");
        assert_eq!(sanitize("ok_1"), "ok_1");
        assert_eq!(sanitize(""), "unnamed");
    }

    #[test]
    fn lone_bit_field_spans_its_width() {
        let doc = parse("struct S\n{\n    unsigned short mode : 4;\n};\n").expect("parse");
        let spec = lower(&doc, "t");
        let fields = &spec.components.as_ref().expect("components").schemas["S"].fields;
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_type, FieldType::Uint16);
        assert_eq!(fields[0].bit_fields()[0].bit_range.as_deref(), Some("0:3"));
    }

    #[test]
    fn raise_writes_strings_as_bytes() {
        let mut spec = Spec::default();
        spec.components = Some(Components::default());
        if let Some(c) = spec.components.as_mut() {
            c.schemas.insert(
                "Name".to_string(),
                ComponentSchema {
                    description: String::new(),
                    fields: vec![FieldDefinition::new("text", FieldType::String)
                        .with_size(2)
                        .with_description("label")],
                },
            );
        }
        let text = raise(&spec);
        assert!(text.contains("    unsigned char text_0; // label\n"));
        assert!(text.contains("    unsigned char text_1;\n"));
        assert!(text.contains("//+MOST_BYTE=true"));
    }
}
