//! Output budgets for network rendering
//!
//! Every limit has a built-in default and can be overridden through a
//! `PHOENIX_NETLOG_*` environment variable.

use std::time::Duration;

/// Size budgets applied when listing and rendering network exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkLimits {
    /// Bytes of request body shown in a summary record
    pub request_body_snippet_bytes: usize,
    /// Elements kept per JSON array before the rest are elided
    pub json_max_array_length: usize,
    /// Characters kept per JSON string value
    pub json_max_string_length: usize,
    /// Ceiling on the serialized JSON after structural truncation
    pub json_max_bytes: usize,
    /// Bytes kept from a text body
    pub text_max_bytes: usize,
}

impl Default for NetworkLimits {
    fn default() -> Self {
        Self {
            request_body_snippet_bytes: 300,
            json_max_array_length: 5,
            json_max_string_length: 300,
            json_max_bytes: 8192,
            text_max_bytes: 2048,
        }
    }
}

impl NetworkLimits {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build limits from an arbitrary key lookup; unset or unparseable keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: usize| -> usize {
            let Some(raw) = lookup(key) else {
                return default;
            };
            match raw.trim().parse::<usize>() {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(key, value = %raw, error = %e, "Ignoring invalid limit, using default");
                    default
                }
            }
        };

        Self {
            request_body_snippet_bytes: read(
                "PHOENIX_NETLOG_REQUEST_BODY_BYTES",
                defaults.request_body_snippet_bytes,
            ),
            json_max_array_length: read(
                "PHOENIX_NETLOG_JSON_ARRAY_LENGTH",
                defaults.json_max_array_length,
            ),
            json_max_string_length: read(
                "PHOENIX_NETLOG_JSON_STRING_LENGTH",
                defaults.json_max_string_length,
            ),
            json_max_bytes: read("PHOENIX_NETLOG_JSON_MAX_BYTES", defaults.json_max_bytes),
            text_max_bytes: read("PHOENIX_NETLOG_TEXT_MAX_BYTES", defaults.text_max_bytes),
        }
    }
}

/// Parse duration from string like "15s", "1m", "500ms"
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse().ok().map(Duration::from_millis)
    } else if let Some(s_val) = s.strip_suffix('s') {
        s_val.trim().parse().ok().map(Duration::from_secs)
    } else if let Some(m) = s.strip_suffix('m') {
        m.trim()
            .parse::<u64>()
            .ok()
            .map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse().ok().map(Duration::from_secs)
    }
}
