//! Parse configuration: the primitive type table and directive defaults.
//!
//! Passed explicitly to [`crate::parser::parse_with`]; nothing here is global.

use crate::schema::Endian;
use crate::types::TypeTable;

/// Document-level directives (`//+PACK_SIZE=`, `//+MOST_BYTE=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveSet {
    pub pack_size: u32,
    /// `MOST_BYTE=true`: most significant byte first.
    pub big_endian: bool,
}

impl Default for DirectiveSet {
    fn default() -> Self {
        DirectiveSet {
            pack_size: 1,
            big_endian: true,
        }
    }
}

impl DirectiveSet {
    pub fn endian(&self) -> Endian {
        if self.big_endian {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub types: TypeTable,
    /// Starting values; directives in the document override them.
    pub directives: DirectiveSet,
}

impl ParseOptions {
    pub fn with_types(mut self, types: TypeTable) -> Self {
        self.types = types;
        self
    }

    pub fn with_directives(mut self, directives: DirectiveSet) -> Self {
        self.directives = directives;
        self
    }
}
