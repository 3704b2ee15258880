//! # udpapi: schema-driven codec for fixed-layout UDP messages
//!
//! Messages are described in one of two notations and compiled into a
//! canonical [`Spec`]; the codec then turns string values into bytes and bytes
//! back into typed, labeled values.
//!
//! ## Notations
//!
//! - **IDL**: C-like structs with `//+KEY=VALUE` directives and `//$(X)$` markers
//!   ([`parser`], lowered by [`convert::lower`])
//! - **JSON**: the canonical model serialized directly ([`json`])
//!
//! ## Example IDL
//!
//! ```text
//! //+PACK_SIZE=1
//! //+MOST_BYTE=true
//!
//! struct MsgHeader //$()$
//! {
//!     unsigned short MsgID; //$()$
//!     unsigned short Length;
//! };
//!
//! struct Ping //$(0x01)$ // liveness probe
//! {
//!     MsgHeader header;
//!     unsigned char code;
//!     unsigned char flag : 1;
//!     unsigned char mode : 7;
//! };
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! let spec = udpapi::parse_file("ping.idl")?;
//! let schema = spec.messages["Msg_0001_Ping"].request.as_ref().unwrap();
//! let mut values = HashMap::new();
//! values.insert("payload.code".to_string(), "7".to_string());
//! let bytes = udpapi::encode(schema, &values);
//! let decoded = udpapi::decode(&bytes, schema);
//! assert_eq!(decoded.display("payload.code"), Some("7"));
//! # Ok::<(), udpapi::SpecError>(())
//! ```

pub mod ast;
pub mod codec;
pub mod config;
pub mod convert;
pub mod dump;
pub mod error;
pub mod json;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod types;
pub mod value;

pub use ast::{IdlDocument, IdlField, StructDef, StructKind};
pub use codec::{decode, encode, encode_fields, Codec, EncodeFailure, EncodedField, Encoding};
pub use config::{DirectiveSet, ParseOptions};
pub use convert::{lower, raise};
pub use error::{Result, SpecError};
pub use parser::{parse, parse_with};
pub use registry::{
    create_default_spec, parse_file, save_to_file, IdlSpecParser, JsonSpecParser, ParserRegistry,
    SpecParser,
};
pub use schema::{
    BitFieldDefinition, Endian, FieldDefinition, FieldType, Format, MessageDefinition,
    MessageSchema, Spec,
};
pub use types::{PrimitiveType, TypeTable};
pub use value::{DecodeStatus, DecodedMessage, ParsedValue, Value};
