//! Bounded rendering of bodies: byte prefixes and structural JSON truncation

use serde_json::{Map, Value};

fn truncation_note(original_length: usize) -> String {
    format!("... (truncated, original length: {original_length})")
}

/// Decode at most `max_bytes` bytes of `bytes` as UTF-8.
///
/// A multi-byte character cut in half by the limit is dropped rather than
/// turned into a replacement character. Invalid sequences elsewhere are
/// decoded lossily.
pub(crate) fn decode_prefix(bytes: &[u8], max_bytes: usize) -> String {
    let prefix = bytes.get(..max_bytes).unwrap_or(bytes);
    match std::str::from_utf8(prefix) {
        Ok(text) => text.to_string(),
        Err(e) if e.error_len().is_none() => {
            String::from_utf8_lossy(prefix.get(..e.valid_up_to()).unwrap_or_default()).into_owned()
        }
        Err(_) => String::from_utf8_lossy(prefix).into_owned(),
    }
}

/// Decode `bytes`, keeping at most `max_bytes` and noting the original size when cut.
#[must_use]
pub fn truncate_bytes(bytes: &[u8], max_bytes: usize) -> String {
    if bytes.len() <= max_bytes {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    format!(
        "{}\n... (truncated, original length: {} bytes)",
        decode_prefix(bytes, max_bytes),
        bytes.len()
    )
}

/// Cap every string and array in `value`, recursively.
///
/// Strings keep `max_string_length` characters plus a note of their original
/// length. Arrays keep `max_array_length` elements followed by one note
/// element. Object keys are always kept; only their values shrink.
#[must_use]
pub fn truncate_structure(value: &Value, max_array_length: usize, max_string_length: usize) -> Value {
    match value {
        Value::String(s) => {
            let length = s.chars().count();
            if length <= max_string_length {
                return value.clone();
            }
            let prefix: String = s.chars().take(max_string_length).collect();
            Value::String(format!("{prefix}{}", truncation_note(length)))
        }
        Value::Array(items) => {
            let mut kept: Vec<Value> = items
                .iter()
                .take(max_array_length)
                .map(|item| truncate_structure(item, max_array_length, max_string_length))
                .collect();
            if items.len() > max_array_length {
                kept.push(Value::String(truncation_note(items.len())));
            }
            Value::Array(kept)
        }
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, field)| {
                    (
                        key.clone(),
                        truncate_structure(field, max_array_length, max_string_length),
                    )
                })
                .collect::<Map<String, Value>>(),
        ),
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
    }
}

/// Serialize `value` compactly, cutting the text if it exceeds `max_bytes`.
///
/// Structural caps bound the size of each node but not the number of nodes,
/// so wide documents still need this final ceiling.
#[must_use]
pub fn serialize_with_ceiling(value: &Value, max_bytes: usize) -> String {
    truncate_bytes(value.to_string().as_bytes(), max_bytes)
}
