//! Abstract Syntax Tree for the IDL notation.

use crate::config::DirectiveSet;
use crate::types::PrimitiveType;
use std::collections::HashSet;

/// Root of a parsed IDL source: directives and structs in declaration order.
#[derive(Debug, Clone, Default)]
pub struct IdlDocument {
    pub directives: DirectiveSet,
    pub structs: Vec<StructDef>,
}

/// Role of a struct, taken from its `//$(X)$` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructKind {
    /// No marker: a reusable struct.
    User,
    /// Empty marker `//$()$`.
    Header,
    /// Non-empty marker. `id_text` keeps the literal as written (`10`, `0x0A`).
    Message { id: u32, id_text: String },
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub kind: StructKind,
    pub fields: Vec<IdlField>,
    pub comment: String,
}

impl StructDef {
    pub fn is_header(&self) -> bool {
        self.kind == StructKind::Header
    }

    pub fn message_id(&self) -> Option<(u32, &str)> {
        match &self.kind {
            StructKind::Message { id, id_text } => Some((*id, id_text.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdlField {
    pub name: String,
    /// As written, words joined by a single space (`unsigned short`).
    pub type_name: String,
    pub primitive: PrimitiveType,
    pub array_size: Option<u32>,
    pub bit_field_size: Option<u32>,
    /// Field line carried the `//$()$` marker.
    pub is_message_id: bool,
    pub comment: String,
}

impl IdlField {
    pub fn is_array(&self) -> bool {
        self.array_size.is_some()
    }

    /// The parser only keeps a bit width on integer primitives.
    pub fn is_bit_field(&self) -> bool {
        self.bit_field_size.is_some()
    }

    pub fn is_struct(&self) -> bool {
        self.primitive == PrimitiveType::Struct
    }

    pub fn count(&self) -> usize {
        self.array_size.unwrap_or(1) as usize
    }

    /// Size of one element: the primitive width, or the referenced struct's size.
    pub fn element_size(&self, doc: &IdlDocument) -> usize {
        self.element_size_guarded(doc, &mut HashSet::new())
    }

    /// Bytes occupied by this field. Bit fields report 0: their storage is
    /// accounted for when sibling bit fields are grouped.
    pub fn total_size(&self, doc: &IdlDocument) -> usize {
        self.total_size_guarded(doc, &mut HashSet::new())
    }

    fn element_size_guarded<'a>(&'a self, doc: &'a IdlDocument, visiting: &mut HashSet<&'a str>) -> usize {
        if !self.is_struct() {
            return self.primitive.size();
        }
        doc.struct_size_guarded(&self.type_name, visiting)
    }

    fn total_size_guarded<'a>(&'a self, doc: &'a IdlDocument, visiting: &mut HashSet<&'a str>) -> usize {
        if self.is_bit_field() {
            return 0;
        }
        self.element_size_guarded(doc, visiting) * self.count()
    }
}

impl IdlDocument {
    pub fn get_struct(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.name == name)
    }

    /// The struct marked `//$()$`, if any.
    pub fn header_struct(&self) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.is_header())
    }

    pub fn message_structs(&self) -> impl Iterator<Item = &StructDef> {
        self.structs.iter().filter(|s| s.message_id().is_some())
    }

    pub fn user_structs(&self) -> impl Iterator<Item = &StructDef> {
        self.structs.iter().filter(|s| s.kind == StructKind::User)
    }

    /// Sum of the field sizes of a struct, recursing through nested structs.
    /// Unknown structs and recursive references contribute 0.
    pub fn struct_size(&self, name: &str) -> usize {
        self.struct_size_guarded(name, &mut HashSet::new())
    }

    fn struct_size_guarded<'a>(&'a self, name: &str, visiting: &mut HashSet<&'a str>) -> usize {
        let Some(s) = self.get_struct(name) else {
            return 0;
        };
        if !visiting.insert(s.name.as_str()) {
            tracing::warn!(name, "recursive struct reference");
            return 0;
        }
        let size: usize = group_fields(&s.fields)
            .into_iter()
            .map(|g| match g {
                FieldGroup::Single(f) => f.total_size_guarded(self, visiting),
                FieldGroup::Bits(members) => members[0].primitive.size(),
            })
            .sum();
        visiting.remove(s.name.as_str());
        size
    }
}

/// Consecutive fields as laid out on the wire: plain fields, or runs of bit fields
/// sharing one storage unit.
#[derive(Debug)]
pub enum FieldGroup<'a> {
    Single(&'a IdlField),
    /// Never empty; all members have the same primitive and their widths fit in it.
    Bits(Vec<&'a IdlField>),
}

/// Pack adjacent bit fields into storage units the way a C compiler does with
/// `pack(1)`: a run continues while the primitive is unchanged and the widths fit.
pub fn group_fields(fields: &[IdlField]) -> Vec<FieldGroup<'_>> {
    let mut out = Vec::new();
    let mut run: Vec<&IdlField> = Vec::new();
    let mut used = 0u32;
    for f in fields {
        match f.bit_field_size {
            Some(width) => {
                let storage_bits = (f.primitive.size() * 8) as u32;
                let fits = run.first().is_some_and(|first| first.primitive == f.primitive)
                    && used + width <= storage_bits;
                if !fits && !run.is_empty() {
                    out.push(FieldGroup::Bits(std::mem::take(&mut run)));
                    used = 0;
                }
                run.push(f);
                used += width;
            }
            None => {
                if !run.is_empty() {
                    out.push(FieldGroup::Bits(std::mem::take(&mut run)));
                    used = 0;
                }
                out.push(FieldGroup::Single(f));
            }
        }
    }
    if !run.is_empty() {
        out.push(FieldGroup::Bits(run));
    }
    out
}
