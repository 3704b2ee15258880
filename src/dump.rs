//! Format decoded values for display: hex dumps, radix formats, enum labels and
//! a one-field-per-line text dump of a whole message.

use crate::value::{DecodeStatus, DecodedMessage};
use std::collections::BTreeMap;

/// Space separated upper-case octets, e.g. `01 0A FF`.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `0x` followed by `width * 2` zero-padded upper-case digits.
pub fn format_hex(bits: u64, width: usize) -> String {
    format!("0x{:0w$X}", bits, w = width * 2)
}

/// `0b` followed by `width * 8` zero-padded digits.
pub fn format_binary(bits: u64, width: usize) -> String {
    format!("0b{:0w$b}", bits, w = width * 8)
}

/// `"<label> (<display>)"` when `display` (or the plain decimal text) is a key of
/// the enum map; `display` unchanged otherwise.
pub fn label_enum(
    display: String,
    decimal: &str,
    enum_values: Option<&BTreeMap<String, String>>,
) -> String {
    let Some(map) = enum_values else {
        return display;
    };
    match map.get(display.as_str()).or_else(|| map.get(decimal)) {
        Some(label) => format!("{} ({})", label, display),
        None => display,
    }
}

/// One `key: display` line per decoded entry, with a marker for fail-soft entries.
pub fn message_to_dump(message: &DecodedMessage) -> String {
    let width = message.keys().map(str::len).max().unwrap_or(0);
    message
        .iter()
        .map(|(key, v)| {
            let note = match &v.status {
                DecodeStatus::Ok => String::new(),
                DecodeStatus::Truncated => "  [truncated]".to_string(),
                DecodeStatus::Fallback(reason) => format!("  [raw: {}]", reason),
            };
            format!("{:w$}  {}{}", key, v.display, note, w = width)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_formats_are_zero_padded() {
        assert_eq!(format_hex(0x1A, 2), "0x001A");
        assert_eq!(format_hex(0xFF, 1), "0xFF");
        assert_eq!(format_binary(5, 1), "0b00000101");
        assert_eq!(hex_dump(&[1, 0x0a, 0xff]), "01 0A FF");
    }

    #[test]
    fn enum_label_matches_display_or_decimal() {
        let mut m = BTreeMap::new();
        m.insert("1".to_string(), "On".to_string());
        m.insert("0x02".to_string(), "Standby".to_string());
        assert_eq!(label_enum("1".to_string(), "1", Some(&m)), "On (1)");
        assert_eq!(label_enum("0x02".to_string(), "2", Some(&m)), "Standby (0x02)");
        assert_eq!(label_enum("0x01".to_string(), "1", Some(&m)), "On (0x01)");
        assert_eq!(label_enum("3".to_string(), "3", Some(&m)), "3");
        assert_eq!(label_enum("3".to_string(), "3", None), "3");
    }

    #[test]
    fn dump_marks_truncated_entries() {
        use crate::schema::{FieldDefinition, FieldType, MessageSchema};
        let schema = MessageSchema::new(
            Vec::new(),
            vec![
                FieldDefinition::new("a", FieldType::Byte),
                FieldDefinition::new("bb", FieldType::Uint32),
            ],
        );
        let decoded = crate::codec::decode(&[7, 1], &schema);
        assert_eq!(
            message_to_dump(&decoded),
            "payload.a   7\npayload.bb  N/A  [truncated]"
        );
    }
}
