//! Primitive types of the IDL notation and the alias table resolving type names.

use crate::schema::FieldType;
use std::collections::HashMap;

/// Primitive kind of an IDL field. `Struct` marks a reference to a user struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Char,
    UnsignedChar,
    Bool,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    Float,
    Double,
    Struct,
}

impl PrimitiveType {
    /// Byte width; 0 for `Struct` (computed through the document instead).
    pub fn size(self) -> usize {
        match self {
            PrimitiveType::Char | PrimitiveType::UnsignedChar | PrimitiveType::Bool => 1,
            PrimitiveType::Short | PrimitiveType::UnsignedShort => 2,
            PrimitiveType::Int | PrimitiveType::UnsignedInt | PrimitiveType::Float => 4,
            PrimitiveType::Long | PrimitiveType::UnsignedLong | PrimitiveType::Double => 8,
            PrimitiveType::Struct => 0,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveType::Char
                | PrimitiveType::Short
                | PrimitiveType::Int
                | PrimitiveType::Long
                | PrimitiveType::Float
                | PrimitiveType::Double
        )
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            PrimitiveType::Float | PrimitiveType::Double | PrimitiveType::Struct
        )
    }

    /// Canonical field type; `None` for struct references.
    pub fn canonical(self) -> Option<FieldType> {
        Some(match self {
            PrimitiveType::Char => FieldType::Int8,
            PrimitiveType::UnsignedChar | PrimitiveType::Bool => FieldType::Byte,
            PrimitiveType::Short => FieldType::Int16,
            PrimitiveType::UnsignedShort => FieldType::Uint16,
            PrimitiveType::Int => FieldType::Int32,
            PrimitiveType::UnsignedInt => FieldType::Uint32,
            PrimitiveType::Long => FieldType::Int64,
            PrimitiveType::UnsignedLong => FieldType::Uint64,
            PrimitiveType::Float => FieldType::Float,
            PrimitiveType::Double => FieldType::Double,
            PrimitiveType::Struct => return None,
        })
    }

    /// IDL spelling of a canonical type. Variable-width types are written as bytes.
    pub fn idl_name(field_type: FieldType) -> &'static str {
        match field_type {
            FieldType::Byte | FieldType::Padding | FieldType::String | FieldType::Bytes => {
                "unsigned char"
            }
            FieldType::Int8 => "char",
            FieldType::Int16 => "short",
            FieldType::Uint16 => "unsigned short",
            FieldType::Int32 => "int",
            FieldType::Uint32 => "unsigned int",
            FieldType::Int64 => "long",
            FieldType::Uint64 => "unsigned long",
            FieldType::Float => "float",
            FieldType::Double => "double",
        }
    }
}

const BUILTIN_ALIASES: &[(&str, PrimitiveType)] = &[
    ("char", PrimitiveType::Char),
    ("int8", PrimitiveType::Char),
    ("int8_t", PrimitiveType::Char),
    ("sbyte", PrimitiveType::Char),
    ("signedchar", PrimitiveType::Char),
    ("unsignedchar", PrimitiveType::UnsignedChar),
    ("uchar", PrimitiveType::UnsignedChar),
    ("uint8", PrimitiveType::UnsignedChar),
    ("uint8_t", PrimitiveType::UnsignedChar),
    ("byte", PrimitiveType::UnsignedChar),
    ("bool", PrimitiveType::Bool),
    ("boolean", PrimitiveType::Bool),
    ("short", PrimitiveType::Short),
    ("int16", PrimitiveType::Short),
    ("int16_t", PrimitiveType::Short),
    ("shortint", PrimitiveType::Short),
    ("signedshort", PrimitiveType::Short),
    ("unsignedshort", PrimitiveType::UnsignedShort),
    ("ushort", PrimitiveType::UnsignedShort),
    ("uint16", PrimitiveType::UnsignedShort),
    ("uint16_t", PrimitiveType::UnsignedShort),
    ("word", PrimitiveType::UnsignedShort),
    ("int", PrimitiveType::Int),
    ("int32", PrimitiveType::Int),
    ("int32_t", PrimitiveType::Int),
    ("signed", PrimitiveType::Int),
    ("signedint", PrimitiveType::Int),
    ("unsignedint", PrimitiveType::UnsignedInt),
    ("uint", PrimitiveType::UnsignedInt),
    ("uint32", PrimitiveType::UnsignedInt),
    ("uint32_t", PrimitiveType::UnsignedInt),
    ("unsigned", PrimitiveType::UnsignedInt),
    ("dword", PrimitiveType::UnsignedInt),
    ("long", PrimitiveType::Long),
    ("int64", PrimitiveType::Long),
    ("int64_t", PrimitiveType::Long),
    ("longlong", PrimitiveType::Long),
    ("signedlong", PrimitiveType::Long),
    ("unsignedlong", PrimitiveType::UnsignedLong),
    ("ulong", PrimitiveType::UnsignedLong),
    ("uint64", PrimitiveType::UnsignedLong),
    ("uint64_t", PrimitiveType::UnsignedLong),
    ("unsignedlonglong", PrimitiveType::UnsignedLong),
    ("qword", PrimitiveType::UnsignedLong),
    ("float", PrimitiveType::Float),
    ("float32", PrimitiveType::Float),
    ("single", PrimitiveType::Float),
    ("double", PrimitiveType::Double),
    ("float64", PrimitiveType::Double),
];

/// Maps normalized type names (lower-case, no whitespace) to primitives.
#[derive(Debug, Clone)]
pub struct TypeTable {
    aliases: HashMap<String, PrimitiveType>,
}

impl Default for TypeTable {
    fn default() -> Self {
        TypeTable {
            aliases: BUILTIN_ALIASES
                .iter()
                .map(|(name, ty)| (name.to_string(), *ty))
                .collect(),
        }
    }
}

impl TypeTable {
    /// A table with no aliases: every type name is a struct reference.
    pub fn empty() -> Self {
        TypeTable {
            aliases: HashMap::new(),
        }
    }

    pub fn with_alias(mut self, name: &str, ty: PrimitiveType) -> Self {
        self.aliases.insert(normalize(name), ty);
        self
    }

    /// Resolve a type name; unknown names are struct references.
    pub fn resolve(&self, type_name: &str) -> PrimitiveType {
        self.aliases
            .get(&normalize(type_name))
            .copied()
            .unwrap_or(PrimitiveType::Struct)
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
