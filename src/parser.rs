//! Parse IDL source into an [`IdlDocument`] using PEST.
//!
//! Parsing is line oriented and permissive: a line that matches no rule is
//! skipped, never reported as an error. Only blank input fails.

use crate::ast::*;
use crate::config::{DirectiveSet, ParseOptions};
use crate::error::{Result, SpecError};
use crate::types::TypeTable;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::collections::HashSet;

#[derive(PestParser)]
#[grammar = "idl.pest"]
struct IdlParser;

/// Marks the header struct on a declaration line, and the message-id field on a field line.
pub const ID_MARKER: &str = "//$()$";

/// Parse IDL source with the default type table and directive defaults.
pub fn parse(source: &str) -> Result<IdlDocument> {
    parse_with(source, &ParseOptions::default())
}

pub fn parse_with(source: &str, options: &ParseOptions) -> Result<IdlDocument> {
    if source.trim().is_empty() {
        return Err(SpecError::EmptyInput);
    }
    let lines: Vec<&str> = source.lines().collect();

    let mut directives = options.directives;
    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }
        match parse_directive(lines[i]) {
            Some((key, value)) => {
                apply_directive(&mut directives, &key, &value);
                i += 1;
            }
            None => break,
        }
    }

    let mut structs = Vec::new();
    while i < lines.len() {
        match parse_declaration(lines[i]) {
            Some(decl) => {
                let (def, next) = build_struct(decl, &lines, i, &options.types);
                structs.push(def);
                i = next;
            }
            None => i += 1,
        }
    }
    check_structs(&mut structs);

    Ok(IdlDocument {
        directives,
        structs,
    })
}

fn parse_directive(line: &str) -> Option<(String, String)> {
    let pair = IdlParser::parse(Rule::directive, line).ok()?.next()?;
    let mut key = None;
    let mut value = String::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::directive_key => key = Some(inner.as_str().to_ascii_uppercase()),
            Rule::directive_value => value = inner.as_str().trim().to_string(),
            _ => {}
        }
    }
    Some((key?, value))
}

fn apply_directive(directives: &mut DirectiveSet, key: &str, value: &str) {
    match key {
        "PACK_SIZE" => match value.parse::<u32>() {
            Ok(n) if n >= 1 => directives.pack_size = n,
            _ => tracing::debug!(value, "ignoring invalid PACK_SIZE"),
        },
        "MOST_BYTE" => directives.big_endian = value.eq_ignore_ascii_case("true"),
        _ => tracing::debug!(key, "ignoring unknown directive"),
    }
}

struct StructDecl {
    name: String,
    marker: Option<String>,
    trailer: String,
}

fn parse_struct_decl(line: &str) -> Option<StructDecl> {
    let pair = IdlParser::parse(Rule::struct_decl, line).ok()?.next()?;
    let mut name = String::new();
    let mut marker = None;
    let mut trailer = String::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::word => name = inner.as_str().to_string(),
            Rule::message_marker => {
                marker = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::marker_body)
                    .map(|p| p.as_str().to_string());
            }
            Rule::decl_trailer => trailer = inner.as_str().to_string(),
            _ => {}
        }
    }
    Some(StructDecl {
        name,
        marker,
        trailer,
    })
}

/// A struct declaration line, as opposed to a `struct T name;` field line.
fn parse_declaration(line: &str) -> Option<StructDecl> {
    parse_struct_decl(line).filter(|d| {
        let code = code_part(&d.trailer).trim_start();
        code.is_empty() || code.starts_with('{')
    })
}

/// Text before the first `//`.
fn code_part(text: &str) -> &str {
    text.find("//").map_or(text, |p| &text[..p])
}

/// Text after an opening `{` outside comments.
fn opening_brace(line: &str) -> Option<&str> {
    code_part(line).find('{').map(|p| &line[p + 1..])
}

/// Message id literal: decimal, or hex with a `0x`/`0X` prefix.
pub fn parse_message_id(text: &str) -> Option<u32> {
    let t = text.trim();
    match t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => t.parse().ok(),
    }
}

fn struct_kind(name: &str, marker: Option<&str>) -> StructKind {
    match marker.map(str::trim) {
        None => StructKind::User,
        Some("") => StructKind::Header,
        Some(text) => match parse_message_id(text) {
            Some(id) => StructKind::Message {
                id,
                id_text: text.to_string(),
            },
            None => {
                tracing::debug!(name, marker = text, "unparseable message id; treating as plain struct");
                StructKind::User
            }
        },
    }
}

/// Build a struct from its declaration at `lines[start]`. Returns the index of the
/// first line after the body.
fn build_struct(decl: StructDecl, lines: &[&str], start: usize, types: &TypeTable) -> (StructDef, usize) {
    let comment = decl
        .trailer
        .find("//")
        .map(|p| decl.trailer[p + 2..].trim().to_string())
        .unwrap_or_default();
    let mut def = StructDef {
        kind: struct_kind(&decl.name, decl.marker.as_deref()),
        name: decl.name,
        fields: Vec::new(),
        comment,
    };

    let mut j = start + 1;
    let opening = match opening_brace(&decl.trailer) {
        Some(rest) => rest,
        None => loop {
            let Some(line) = lines.get(j) else {
                return (def, j);
            };
            if parse_declaration(line).is_some() {
                tracing::debug!(name = %def.name, "struct declaration without body");
                return (def, j);
            }
            j += 1;
            if let Some(rest) = opening_brace(line) {
                break rest;
            }
        },
    };
    if push_body_text(&mut def, opening, types) {
        return (def, j);
    }

    while let Some(line) = lines.get(j) {
        if parse_declaration(line).is_some() {
            tracing::debug!(name = %def.name, "struct body not closed before next declaration");
            break;
        }
        j += 1;
        if push_body_text(&mut def, line, types) {
            break;
        }
    }
    (def, j)
}

/// Parse the fields of one line of body text, up to a closing `}`. Several
/// `;`-terminated fields may share a line; a trailing comment belongs to the last.
/// Returns true when the line closes the body.
fn push_body_text(def: &mut StructDef, text: &str, types: &TypeTable) -> bool {
    let code = code_part(text);
    let (code, comment, closed) = match code.find('}') {
        Some(p) => (&code[..p], "", true),
        None => (code, &text[code.len()..], false),
    };
    let statements: Vec<&str> = code.split_inclusive(';').filter(|s| s.ends_with(';')).collect();
    let last = statements.len().saturating_sub(1);
    for (i, statement) in statements.iter().enumerate() {
        let line = if i == last {
            format!("{}{}", statement, comment)
        } else {
            statement.to_string()
        };
        if let Some(field) = parse_field_line(&line, types) {
            def.fields.push(field);
        }
    }
    closed
}

fn is_comment_only(trimmed: &str) -> bool {
    trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')
}

/// Parse one body line. `None` for blank, comment-only, and malformed lines.
pub fn parse_field_line(line: &str, types: &TypeTable) -> Option<IdlField> {
    let trimmed = line.trim();
    if trimmed.is_empty() || !trimmed.contains(';') || is_comment_only(trimmed) {
        return None;
    }

    // The marker starts with `//`, so the first `//` opens the marker or the comment.
    let is_message_id = trimmed.contains(ID_MARKER);
    let (code, rest) = match trimmed.find("//") {
        Some(p) => (&trimmed[..p], &trimmed[p..]),
        None => (trimmed, ""),
    };
    let comment = rest.replace(ID_MARKER, "");
    let comment = comment.trim().trim_start_matches('/').trim();

    let pair = match IdlParser::parse(Rule::field_decl, code.trim()) {
        Ok(mut pairs) => pairs.next()?,
        Err(e) => {
            tracing::debug!(line = trimmed, error = %e, "skipping unparseable field line");
            return None;
        }
    };

    let mut type_name = String::new();
    let mut name = String::new();
    let mut array_size = None;
    let mut bit_width = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::type_name => {
                type_name = inner.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            }
            Rule::word => name = inner.as_str().to_string(),
            Rule::array_size => array_size = first_number(inner),
            Rule::bit_width => bit_width = first_number(inner),
            _ => {}
        }
    }
    if let Some(rest) = type_name.strip_prefix("struct ") {
        type_name = rest.to_string();
    }

    let primitive = types.resolve(&type_name);
    let bit_field_size = match bit_width {
        None => None,
        Some(_) if !primitive.is_integer() => {
            tracing::debug!(field = %name, "bit width ignored on non-integer type");
            None
        }
        Some(0) => {
            tracing::debug!(field = %name, "skipping zero-width bit field");
            return None;
        }
        Some(w) => Some(w.min((primitive.size() * 8) as u32)),
    };

    Some(IdlField {
        name,
        type_name,
        primitive,
        array_size,
        bit_field_size,
        is_message_id,
        comment: comment.to_string(),
    })
}

fn first_number(pair: pest::iterators::Pair<Rule>) -> Option<u32> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::number)
        .and_then(|p| p.as_str().parse().ok())
}

/// At most one header struct; names are expected to be unique.
fn check_structs(structs: &mut [StructDef]) {
    let mut seen_header = false;
    let mut names = HashSet::new();
    for s in structs.iter_mut() {
        if !names.insert(s.name.clone()) {
            tracing::warn!(name = %s.name, "duplicate struct name; lookups use the first");
        }
        if s.is_header() {
            if seen_header {
                tracing::warn!(name = %s.name, "second header struct treated as plain struct");
                s.kind = StructKind::User;
            }
            seen_header = true;
        }
    }
}
