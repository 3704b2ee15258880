//! Structured (JSON) notation of a [`Spec`].

use crate::error::{Result, SpecError};
use crate::schema::Spec;

/// Deserialize, validate and resolve `$ref` entries.
pub fn parse(text: &str) -> Result<Spec> {
    if text.trim().is_empty() {
        return Err(SpecError::EmptyInput);
    }
    let mut spec: Spec = serde_json::from_str(text)?;
    spec.validate()?;
    spec.resolve_references();
    Ok(spec)
}

/// Pretty-printed JSON; absent optional values are omitted.
pub fn serialize(spec: &Spec) -> Result<String> {
    Ok(serde_json::to_string_pretty(spec)?)
}
