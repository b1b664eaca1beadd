//! Rendering one exchange's response body under size budgets

use super::classify::{classify, content_type, ContentKind};
use super::exchange::{Exchange, ExchangeSource};
use super::ledger::Ledger;
use super::truncate::{serialize_with_ceiling, truncate_bytes, truncate_structure};
use super::NetworkError;
use crate::config::NetworkLimits;
use serde_json::Value;
use std::fmt;

/// A response body ready to hand back to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedBody {
    Text(String),
    Json {
        /// Structurally truncated value
        value: Value,
        /// Serialized `value`, cut at the byte ceiling if needed
        rendered: String,
        /// Size of the body as received
        original_bytes: usize,
    },
    Image {
        bytes: Vec<u8>,
        content_type: String,
    },
    /// Body not displayable; it was not fetched
    Opaque { content_type: String },
}

impl fmt::Display for RenderedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Json { rendered, .. } => f.write_str(rendered),
            Self::Image {
                bytes,
                content_type,
            } => write!(f, "Image response ({content_type}, {} bytes)", bytes.len()),
            Self::Opaque { content_type } if content_type.is_empty() => {
                f.write_str("Response body has no content type and cannot be displayed")
            }
            Self::Opaque { content_type } => write!(
                f,
                "Response body of type {content_type} cannot be displayed"
            ),
        }
    }
}

async fn fetch_body(
    source: &dyn ExchangeSource,
    exchange: &Exchange,
) -> Result<Vec<u8>, NetworkError> {
    source
        .response_body(exchange)
        .await
        .map_err(|e| NetworkError::fetch(&exchange.id, &e))
}

/// Resolve `id` in `ledger` and render its response body.
///
/// Runs lookup, header fetch and body fetch one after another. Reads only;
/// the exchange is left as it was, so the same id can be rendered again.
///
/// # Errors
///
/// `NotFound` for an unknown id, `NoResponse` while the exchange is pending,
/// and `Fetch` when headers or body cannot be read. Invalid JSON is not an
/// error; it is rendered as text.
pub async fn render(
    ledger: &Ledger,
    source: &dyn ExchangeSource,
    id: &str,
    limits: &NetworkLimits,
) -> Result<RenderedBody, NetworkError> {
    let exchange = ledger
        .lookup(id)
        .ok_or_else(|| NetworkError::NotFound(id.to_string()))?;
    if exchange.is_pending() {
        return Err(NetworkError::NoResponse(id.to_string()));
    }

    let headers = source
        .response_headers(&exchange)
        .await
        .map_err(|e| NetworkError::fetch(id, &e))?;
    let kind = classify(&headers);
    let content_type = content_type(&headers).unwrap_or_default().to_string();
    tracing::debug!(request_id = %id, ?kind, %content_type, "Rendering response body");

    match kind {
        ContentKind::Opaque => Ok(RenderedBody::Opaque { content_type }),
        ContentKind::Image => Ok(RenderedBody::Image {
            bytes: fetch_body(source, &exchange).await?,
            content_type,
        }),
        ContentKind::Textual => Ok(RenderedBody::Text(truncate_bytes(
            &fetch_body(source, &exchange).await?,
            limits.text_max_bytes,
        ))),
        ContentKind::Structured => {
            let body = fetch_body(source, &exchange).await?;
            match serde_json::from_slice::<Value>(&body) {
                Ok(decoded) => {
                    let value = truncate_structure(
                        &decoded,
                        limits.json_max_array_length,
                        limits.json_max_string_length,
                    );
                    let rendered = serialize_with_ceiling(&value, limits.json_max_bytes);
                    Ok(RenderedBody::Json {
                        value,
                        rendered,
                        original_bytes: body.len(),
                    })
                }
                Err(e) => {
                    tracing::debug!(request_id = %id, error = %e, "JSON decode failed, rendering as text");
                    Ok(RenderedBody::Text(truncate_bytes(&body, limits.text_max_bytes)))
                }
            }
        }
    }
}
