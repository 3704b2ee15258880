//! Integration tests: IDL file to encoded bytes and back, notation conversion,
//! export stability and the file helpers.

use std::collections::HashMap;
use std::fs;
use udpapi::registry::ParserRegistry;
use udpapi::schema::{ComponentSchema, Components, Format};
use udpapi::{
    create_default_spec, decode, encode, lower, parse, parse_file, raise, save_to_file,
    FieldDefinition, FieldType, MessageDefinition, MessageSchema, Spec, SpecError,
};

const TRACKING: &str = r#"//+PACK_SIZE=1
//+MOST_BYTE=true

struct MsgHeader //$()$
{
    unsigned short MsgID; //$()$
    unsigned short Length;
};

struct Point // position in metres
{
    int x;
    int y;
};

struct Ping //$(1)$
{
    MsgHeader h;
    unsigned char code;
};

struct Track //$(0x20)$ // track report
{
    MsgHeader header;
    unsigned int track_id;
    Point pos[2];
    unsigned char valid : 1;
    unsigned char kind : 3; // target class
    unsigned char quality : 4;
    char callsign[4];
    double speed;
};
"#;

fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn reimport(spec: &Spec) -> Spec {
    lower(&parse(&raise(spec)).expect("parse exported text"), "export")
}

#[test]
fn idl_file_to_bytes_and_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tracking.idl");
    fs::write(&path, TRACKING).expect("write");

    let spec = parse_file(&path).expect("parse_file");
    assert_eq!(spec.info.title, "tracking");
    assert_eq!(
        spec.messages.keys().collect::<Vec<_>>(),
        vec!["Msg_0001_Ping", "Msg_0032_Track"]
    );

    let ping = spec.messages["Msg_0001_Ping"].request.as_ref().expect("request");
    let bytes = encode(ping, &values(&[("payload.code", "7")]));
    assert_eq!(bytes, vec![0x00, 0x01, 0x00, 0x00, 0x07]);

    let track = spec.messages["Msg_0032_Track"].request.as_ref().expect("request");
    assert_eq!(track.total_size(), 4 + 4 + 16 + 1 + 4 + 8);
    let vals = values(&[
        ("header.Length", "33"),
        ("payload.track_id", "4242"),
        ("payload.pos[1].y", "-3"),
        ("payload.valid_kind_quality.valid", "1"),
        ("payload.valid_kind_quality.kind", "5"),
        ("payload.valid_kind_quality.quality", "9"),
        ("payload.callsign[0]", "65"),
        ("payload.speed", "231.25"),
    ]);
    let bytes = encode(track, &vals);
    assert_eq!(bytes.len(), track.total_size());
    assert_eq!(&bytes[..4], &[0x00, 0x20, 0x00, 0x21]);
    // valid | kind << 1 | quality << 4
    assert_eq!(bytes[24], 0x01 | (5 << 1) | (9 << 4));

    let decoded = decode(&bytes, track);
    assert_eq!(decoded.display("header.MsgID"), Some("32"));
    assert_eq!(decoded.display("payload.track_id"), Some("4242"));
    assert_eq!(decoded.display("payload.pos[1].y"), Some("-3"));
    assert_eq!(decoded.display("payload.pos[0].x"), Some("0"));
    assert_eq!(decoded.display("payload.valid_kind_quality.kind"), Some("5"));
    assert_eq!(decoded.display("payload.valid_kind_quality.quality"), Some("9"));
    assert_eq!(decoded.display("payload.callsign[0]"), Some("65"));
    assert_eq!(decoded.display("payload.speed"), Some("231.25"));
    assert!(decoded.iter().all(|(_, v)| v.is_ok()));
}

#[test]
fn idl_to_json_and_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let idl = dir.path().join("tracking.gidl");
    let json = dir.path().join("tracking.json");
    fs::write(&idl, TRACKING).expect("write");

    let spec = parse_file(&idl).expect("parse idl");
    save_to_file(&spec, &json).expect("save json");
    let text = fs::read_to_string(&json).expect("read json");
    assert!(text.contains("\"Msg_0032_Track\""));
    assert!(!text.contains("\"$ref\""));

    let again = parse_file(&json).expect("parse json");
    assert_eq!(spec, again);
}

#[test]
fn export_is_stable_after_one_cycle() {
    let from_idl = lower(&parse(TRACKING).expect("parse"), "export");
    let s1 = reimport(&from_idl);
    let s2 = reimport(&s1);
    assert_eq!(s1, s2);

    // ids are renumbered, the header is synthetic and only the payload survives
    let track = s1.messages["Msg_0002_Track"].request.as_ref().expect("request");
    assert!(track.header.is_empty());
    assert_eq!(track.payload[0].name, "track_id");
    assert_eq!(track.payload[1].name, "pos_0__x");
    assert_eq!(s1.components.as_ref().expect("components").headers["CommonHeader"].len(), 2);
}

#[test]
fn export_flattens_variable_width_fields() {
    let mut spec = create_default_spec();
    let payload = vec![
        FieldDefinition::new("label", FieldType::String).with_size(3).with_description("name tag"),
        FieldDefinition::new("gap", FieldType::Padding).with_size(2),
        FieldDefinition::new("flags", FieldType::Uint16)
            .with_format(Format::Hex)
            .with_bits(vec![udpapi::BitFieldDefinition::range("lo", 0, 3)]),
    ];
    spec.messages
        .insert("status".to_string(), MessageDefinition::new(MessageSchema::new(Vec::new(), payload)));
    spec.components = Some(Components {
        schemas: [(
            "Pair".to_string(),
            ComponentSchema {
                description: "two values".to_string(),
                fields: vec![
                    FieldDefinition::new("a", FieldType::Int8),
                    FieldDefinition::new("b", FieldType::Uint64),
                ],
            },
        )]
        .into_iter()
        .collect(),
        headers: Default::default(),
    });

    let text = raise(&spec);
    assert!(text.starts_with("//+PACK_SIZE=1\n//+MOST_BYTE=true\n"));
    assert!(text.contains("struct MsgHeader //$()$\n{\n    unsigned short MsgID; //$()$\n"));
    assert!(text.contains("struct Pair // two values\n{\n    char a;\n    unsigned long b;\n};\n"));
    assert!(text.contains("struct ping //$(1)$ // Connectivity check\n"));
    assert!(text.contains("struct status //$(2)$\n"));
    assert!(text.contains("    unsigned char label_0; // name tag\n    unsigned char label_1;\n"));
    assert!(text.contains("    unsigned char gap_1;\n"));
    assert!(text.contains("    unsigned short lo : 4;\n"));

    let s1 = reimport(&spec);
    let status = s1.messages["Msg_0002_status"].request.as_ref().expect("request");
    assert_eq!(status.total_size(), 3 + 2 + 2);
    assert_eq!(reimport(&s1), s1);
}

#[test]
fn export_keeps_bit_storage_units_apart() {
    let mut spec = create_default_spec();
    let payload = vec![
        FieldDefinition::new("f1", FieldType::Byte)
            .with_bits(vec![udpapi::BitFieldDefinition::single("a", 0)]),
        FieldDefinition::new("f2", FieldType::Byte)
            .with_bits(vec![udpapi::BitFieldDefinition::single("b", 0)]),
        FieldDefinition::new("f3", FieldType::Uint16).with_bits(vec![
            udpapi::BitFieldDefinition::range("hi", 12, 15),
            udpapi::BitFieldDefinition::range("mid", 4, 7),
        ]),
    ];
    spec.messages
        .insert("m".to_string(), MessageDefinition::new(MessageSchema::new(Vec::new(), payload)));

    let text = raise(&spec);
    assert!(text.contains("    unsigned char a : 1;\n    unsigned char _pad1 : 7;\n"));
    assert!(text.contains(concat!(
        "    unsigned short _pad0 : 4;\n",
        "    unsigned short mid : 4;\n",
        "    unsigned short _pad8 : 4;\n",
        "    unsigned short hi : 4;\n",
    )));

    let s1 = reimport(&spec);
    let m = s1.messages["Msg_0001_m"].request.as_ref().expect("request");
    assert_eq!(m.payload.len(), 3);
    assert_eq!(m.total_size(), 1 + 1 + 2);
    let hi = &m.payload[2].bit_fields()[3];
    assert_eq!((hi.name.as_str(), hi.start_bit(), hi.end_bit()), ("hi", 12, 15));

    assert_eq!(m.payload[0].name, "a__pad1");
    let bytes = encode(m, &values(&[("payload.a__pad1.a", "1"), ("payload.b__pad1.b", "1")]));
    assert_eq!(&bytes[..2], &[0x01, 0x01]);
    assert_eq!(reimport(&s1), s1);
}

#[test]
fn file_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.idl");
    assert!(matches!(parse_file(&missing), Err(SpecError::NotFound(_))));

    let empty = dir.path().join("empty.idl");
    fs::write(&empty, "\n  \n").expect("write");
    assert!(matches!(parse_file(&empty), Err(SpecError::EmptyInput)));

    let yaml = dir.path().join("spec.yaml");
    fs::write(&yaml, "udpapi: 1.0").expect("write");
    assert!(matches!(parse_file(&yaml), Err(SpecError::UnsupportedFormat(_))));
    assert!(matches!(
        save_to_file(&create_default_spec(), dir.path().join("out.txt")),
        Err(SpecError::UnsupportedFormat(_))
    ));
}

#[test]
fn registry_parsers_by_kind() {
    let registry = ParserRegistry::default();
    let mut kinds: Vec<_> = registry.extensions().collect();
    kinds.sort();
    assert_eq!(kinds, vec!["gidl", "idl", "json"]);

    let json = registry.parser_for("json").expect("json parser");
    let text = json.serialize(&create_default_spec()).expect("serialize");
    assert_eq!(json.parse(&text).expect("parse"), create_default_spec());

    let idl = registry.parser_for("IDL").expect("idl parser");
    let spec = idl.parse(TRACKING).expect("parse");
    assert_eq!(spec.info.title, "IDL Import");
    assert!(idl.serialize(&spec).expect("raise").contains("struct Track //$(2)$"));
    assert!(matches!(registry.parser_for("xml"), Err(SpecError::UnsupportedFormat(_))));
}
