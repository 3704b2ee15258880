//! Notation selection by file extension, plus file helpers.
//!
//! Both notations implement [`SpecParser`]. [`ParserRegistry`] maps an
//! extension (or kind name) to a constructor, so callers never match on
//! formats themselves.

use crate::config::ParseOptions;
use crate::convert::{lower, raise};
use crate::error::{Result, SpecError};
use crate::schema::{
    Contact, FieldDefinition, FieldType, Format, Info, MessageDefinition, MessageSchema,
    ServerInfo, Spec, SPEC_VERSION,
};
use crate::{json, parser};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Reads and writes one notation.
pub trait SpecParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<Spec>;

    fn serialize(&self, spec: &Spec) -> Result<String>;
}

/// IDL notation. `serialize` is the lossy [`raise`].
#[derive(Debug, Clone, Default)]
pub struct IdlSpecParser {
    pub options: ParseOptions,
    /// Title given to lowered specs.
    pub source_name: String,
}

impl IdlSpecParser {
    pub fn new(source_name: impl Into<String>) -> Self {
        IdlSpecParser {
            options: ParseOptions::default(),
            source_name: source_name.into(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }
}

impl SpecParser for IdlSpecParser {
    fn parse(&self, text: &str) -> Result<Spec> {
        let doc = parser::parse_with(text, &self.options)?;
        Ok(lower(&doc, &self.source_name))
    }

    fn serialize(&self, spec: &Spec) -> Result<String> {
        Ok(raise(spec))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSpecParser;

impl SpecParser for JsonSpecParser {
    fn parse(&self, text: &str) -> Result<Spec> {
        json::parse(text)
    }

    fn serialize(&self, spec: &Spec) -> Result<String> {
        json::serialize(spec)
    }
}

/// Builds a parser; the argument is the source name (file stem).
pub type ParserConstructor = fn(&str) -> Box<dyn SpecParser>;

fn idl_parser(source_name: &str) -> Box<dyn SpecParser> {
    Box::new(IdlSpecParser::new(source_name))
}

fn json_parser(_: &str) -> Box<dyn SpecParser> {
    Box::new(JsonSpecParser)
}

/// Extension (lower-case, no dot) to parser constructor.
#[derive(Clone)]
pub struct ParserRegistry {
    constructors: HashMap<String, ParserConstructor>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        ParserRegistry::empty()
            .with("idl", idl_parser)
            .with("gidl", idl_parser)
            .with("json", json_parser)
    }
}

impl ParserRegistry {
    pub fn empty() -> Self {
        ParserRegistry {
            constructors: HashMap::new(),
        }
    }

    pub fn with(mut self, extension: &str, constructor: ParserConstructor) -> Self {
        self.register(extension, constructor);
        self
    }

    pub fn register(&mut self, extension: &str, constructor: ParserConstructor) {
        self.constructors
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), constructor);
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Parser for a kind name (`"idl"`, `"json"`, ...).
    pub fn parser_for(&self, kind: &str) -> Result<Box<dyn SpecParser>> {
        self.construct(kind, "")
    }

    /// Parser chosen by the path's extension; the file stem is the source name.
    pub fn parser_for_path(&self, path: &Path) -> Result<Box<dyn SpecParser>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| SpecError::UnsupportedFormat(path.display().to_string()))?;
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        self.construct(extension, stem)
    }

    fn construct(&self, kind: &str, source_name: &str) -> Result<Box<dyn SpecParser>> {
        let key = kind.trim_start_matches('.').to_ascii_lowercase();
        let constructor = self
            .constructors
            .get(&key)
            .ok_or_else(|| SpecError::UnsupportedFormat(kind.to_string()))?;
        Ok(constructor(source_name))
    }
}

/// A small valid spec: one local server and a `ping` message.
pub fn create_default_spec() -> Spec {
    let header = vec![
        FieldDefinition::new("MsgID", FieldType::Uint16)
            .with_value("1")
            .with_format(Format::Hex)
            .with_description("Message identifier"),
        FieldDefinition::new("Length", FieldType::Uint16).with_description("Payload length"),
    ];
    let payload = vec![FieldDefinition::new("Sequence", FieldType::Uint32).with_value("0")];
    let mut ping = MessageDefinition::new(MessageSchema::new(header, payload));
    ping.description = "Connectivity check".to_string();

    let mut spec = Spec {
        version: SPEC_VERSION.to_string(),
        info: Info {
            title: "New UDP API".to_string(),
            description: String::new(),
            version: "1.0.0".to_string(),
            contact: Some(Contact::default()),
        },
        servers: vec![ServerInfo {
            name: "local".to_string(),
            description: "Loopback".to_string(),
            ip: "127.0.0.1".to_string(),
            port: 5000,
        }],
        ..Default::default()
    };
    spec.messages.insert("ping".to_string(), ping);
    spec
}

/// Read a spec, picking the notation from the extension.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Spec> {
    parse_file_with(&ParserRegistry::default(), path.as_ref())
}

pub fn parse_file_with(registry: &ParserRegistry, path: &Path) -> Result<Spec> {
    if !path.is_file() {
        return Err(SpecError::NotFound(path.to_path_buf()));
    }
    let parser = registry.parser_for_path(path)?;
    let text = fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "parsing spec file");
    parser.parse(&text)
}

/// Write a spec in the notation given by the extension.
pub fn save_to_file(spec: &Spec, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = ParserRegistry::default().parser_for_path(path)?.serialize(spec)?;
    fs::write(path, text)?;
    Ok(())
}
