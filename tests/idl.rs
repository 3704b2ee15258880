//! IDL parser tests: directives, struct markers, field lines and size math.

use udpapi::ast::{group_fields, FieldGroup};
use udpapi::{parse, parse_with, DirectiveSet, ParseOptions, PrimitiveType, SpecError, StructKind, TypeTable};

const HEADER_AND_PING: &str = r#"//+PACK_SIZE=1
//+MOST_BYTE=true

struct MsgHeader //$()$
{
    unsigned short MsgID; //$()$
    unsigned short Length;
};

struct Ping //$(1)$ // liveness probe
{
    MsgHeader h;
    unsigned char code;
};
"#;

// ==================== Directives ====================

#[test]
fn directives_default_when_absent() {
    let doc = parse("struct A\n{\n    int x;\n};\n").expect("parse");
    assert_eq!(doc.directives, DirectiveSet::default());
    assert_eq!(doc.directives.pack_size, 1);
    assert!(doc.directives.big_endian);
}

#[test]
fn directives_are_read_until_first_other_line() {
    let src = "//+pack_size=4\n\n//+MOST_BYTE=false\nstruct A\n{\n};\n//+PACK_SIZE=8\n";
    let doc = parse(src).expect("parse");
    assert_eq!(doc.directives.pack_size, 4);
    assert!(!doc.directives.big_endian);
}

#[test]
fn invalid_and_unknown_directives_are_ignored() {
    let src = "//+PACK_SIZE=0\n//+COLOR=blue\n//+MOST_BYTE=TRUE\nstruct A\n{\n};\n";
    let doc = parse(src).expect("parse");
    assert_eq!(doc.directives.pack_size, 1);
    assert!(doc.directives.big_endian);
}

#[test]
fn directive_defaults_come_from_options() {
    let options = ParseOptions::default().with_directives(DirectiveSet {
        pack_size: 2,
        big_endian: false,
    });
    let doc = parse_with("struct A\n{\n};\n", &options).expect("parse");
    assert_eq!(doc.directives.pack_size, 2);
    assert!(!doc.directives.big_endian);
}

// ==================== Structs and markers ====================

#[test]
fn header_and_message_markers() {
    let doc = parse(HEADER_AND_PING).expect("parse");
    assert_eq!(doc.structs.len(), 2);
    let header = doc.header_struct().expect("header");
    assert_eq!(header.name, "MsgHeader");
    assert_eq!(header.fields.len(), 2);
    assert!(header.fields[0].is_message_id);
    assert!(!header.fields[1].is_message_id);

    let ping = doc.get_struct("Ping").expect("ping");
    assert_eq!(ping.message_id(), Some((1, "1")));
    assert_eq!(ping.comment, "liveness probe");
    assert_eq!(ping.fields[0].type_name, "MsgHeader");
    assert_eq!(ping.fields[0].primitive, PrimitiveType::Struct);
}

#[test]
fn hex_and_decimal_ids_are_equal() {
    let src = "struct A //$(0x0A)$\n{\n};\nstruct B //$(10)$\n{\n};\nstruct C //$(0X0a)$\n{\n};\n";
    let doc = parse(src).expect("parse");
    let ids: Vec<_> = doc.message_structs().map(|s| s.message_id()).collect();
    assert_eq!(ids, vec![Some((10, "0x0A")), Some((10, "10")), Some((10, "0X0a"))]);
}

#[test]
fn unparseable_id_is_plain_struct() {
    let doc = parse("struct A //$(ten)$\n{\n    int x;\n};\n").expect("parse");
    assert_eq!(doc.structs[0].kind, StructKind::User);
    assert_eq!(doc.user_structs().count(), 1);
}

#[test]
fn second_header_is_demoted() {
    let src = "struct H1 //$()$\n{\n};\nstruct H2 //$()$\n{\n};\n";
    let doc = parse(src).expect("parse");
    assert_eq!(doc.header_struct().map(|s| s.name.as_str()), Some("H1"));
    assert_eq!(doc.get_struct("H2").map(|s| s.kind.clone()), Some(StructKind::User));
}

#[test]
fn brace_on_declaration_line() {
    let src = "struct A {\n    int x;\n    short y;\n};\nstruct B // plain\n{\n    A a;\n};\n";
    let doc = parse(src).expect("parse");
    assert_eq!(doc.get_struct("A").map(|s| s.fields.len()), Some(2));
    let b = doc.get_struct("B").expect("B");
    assert_eq!(b.kind, StructKind::User);
    assert_eq!(b.comment, "plain");
    assert_eq!(b.fields.len(), 1);
}

#[test]
fn one_line_struct_does_not_absorb_the_next() {
    let src = "struct A { int x; };\nstruct B //$(1)$\n{\n    int y;\n};\n";
    let doc = parse(src).expect("parse");
    let names: Vec<_> = doc.structs.iter().map(|s| (s.name.as_str(), s.fields.len())).collect();
    assert_eq!(names, vec![("A", 1), ("B", 1)]);
    assert_eq!(doc.get_struct("A").expect("A").fields[0].name, "x");
    assert_eq!(doc.get_struct("B").expect("B").fields[0].name, "y");
}

#[test]
fn several_fields_on_one_body_line() {
    let src = "struct P { short x; short y; // coords\n    int z; }\n";
    let doc = parse(src).expect("parse");
    let p = doc.get_struct("P").expect("P");
    let names: Vec<_> = p.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y", "z"]);
    assert_eq!(p.fields[0].comment, "");
    assert_eq!(p.fields[1].comment, "coords");
}

#[test]
fn unclosed_body_ends_at_next_declaration() {
    let src = "struct A\n{\n    int x;\nstruct B //$(2)$\n{\n    struct A a;\n    short y;\n};\n";
    let doc = parse(src).expect("parse");
    assert_eq!(doc.get_struct("A").map(|s| s.fields.len()), Some(1));
    let b = doc.get_struct("B").expect("B");
    let names: Vec<_> = b.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a", "y"]);
    assert_eq!(b.fields[0].type_name, "A");
}

// ==================== Field lines ====================

#[test]
fn malformed_and_comment_lines_are_skipped() {
    let src = r#"
struct A
{
    // int commented;
    /* block */
    int good;
    int missing_semicolon
    = nonsense ;

    unsigned   long   wide;  // trailing comment
};
"#;
    let doc = parse(src).expect("parse");
    let a = doc.get_struct("A").expect("A");
    let names: Vec<_> = a.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["good", "wide"]);
    assert_eq!(a.fields[1].type_name, "unsigned long");
    assert_eq!(a.fields[1].primitive, PrimitiveType::UnsignedLong);
    assert_eq!(a.fields[1].comment, "trailing comment");
}

#[test]
fn arrays_and_bit_fields() {
    let src = "struct A\n{\n    char name[16];\n    unsigned char flag : 1;\n    float f : 3;\n};\n";
    let doc = parse(src).expect("parse");
    let a = doc.get_struct("A").expect("A");
    assert_eq!(a.fields[0].array_size, Some(16));
    assert!(a.fields[0].is_array());
    assert_eq!(a.fields[1].bit_field_size, Some(1));
    // bit widths on floating point types are dropped
    assert!(!a.fields[2].is_bit_field());
}

#[test]
fn custom_type_aliases() {
    let options = ParseOptions::default()
        .with_types(TypeTable::default().with_alias("Word32", PrimitiveType::UnsignedInt));
    let doc = parse_with("struct A\n{\n    WORD32 v;\n};\n", &options).expect("parse");
    assert_eq!(doc.structs[0].fields[0].primitive, PrimitiveType::UnsignedInt);
    let plain = parse("struct A\n{\n    WORD32 v;\n};\n").expect("parse");
    assert_eq!(plain.structs[0].fields[0].primitive, PrimitiveType::Struct);
}

#[test]
fn empty_input_fails() {
    assert!(matches!(parse(""), Err(SpecError::EmptyInput)));
    assert!(matches!(parse("  \n\t\n"), Err(SpecError::EmptyInput)));
    let doc = parse("just some text").expect("permissive");
    assert!(doc.structs.is_empty());
}

// ==================== Sizes ====================

#[test]
fn struct_sizes_recurse() {
    let src = r#"
struct S
{
    unsigned char a;
    unsigned char b[3];
    unsigned short c;
};
struct Outer
{
    S s;
    int x;
    S pair[2];
};
"#;
    let doc = parse(src).expect("parse");
    assert_eq!(doc.struct_size("S"), 6);
    assert_eq!(doc.struct_size("Outer"), 6 + 4 + 12);
    assert_eq!(doc.struct_size("Nope"), 0);
}

#[test]
fn bit_fields_share_storage() {
    let src = r#"
struct Flags
{
    unsigned char a : 3;
    unsigned char b : 5;
    unsigned char c : 1;
    unsigned short d : 4;
    unsigned short e;
};
"#;
    let doc = parse(src).expect("parse");
    let s = doc.get_struct("Flags").expect("Flags");
    assert_eq!(s.fields[0].total_size(&doc), 0);
    let groups = group_fields(&s.fields);
    let shapes: Vec<_> = groups
        .iter()
        .map(|g| match g {
            FieldGroup::Single(f) => vec![f.name.as_str()],
            FieldGroup::Bits(m) => m.iter().map(|f| f.name.as_str()).collect(),
        })
        .collect();
    assert_eq!(shapes, vec![vec!["a", "b"], vec!["c"], vec!["d"], vec!["e"]]);
    assert_eq!(doc.struct_size("Flags"), 1 + 1 + 2 + 2);
}

#[test]
fn recursive_and_unknown_references_are_cut() {
    let src = "struct R\n{\n    R again;\n    int x;\n    Missing m;\n};\n";
    let doc = parse(src).expect("parse");
    assert_eq!(doc.struct_size("R"), 4);
}
