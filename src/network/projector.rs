//! Compact per-exchange summaries for listing

use super::exchange::{Exchange, ExchangeSource, Headers};
use super::truncate::decode_prefix;
use serde::Serialize;

/// One line of the network listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: String,
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body_snippet: Option<String>,
    pub response_headers: Headers,
}

/// Summarize one exchange. Fetches headers from `source` when a response exists;
/// a failed header fetch leaves the headers empty rather than dropping the record.
pub async fn project(
    exchange: &Exchange,
    source: &dyn ExchangeSource,
    snippet_bytes: usize,
) -> SummaryRecord {
    let (status, response_headers) = match exchange.response() {
        Some(response) => {
            let headers = match source.response_headers(exchange).await {
                Ok(headers) => headers,
                Err(e) => {
                    tracing::warn!(request_id = %exchange.id, error = %e, "Failed to fetch response headers");
                    Headers::new()
                }
            };
            (Some(response.status), headers)
        }
        None => (None, Headers::new()),
    };

    SummaryRecord {
        id: exchange.id.clone(),
        method: exchange.method.clone(),
        url: exchange.url.clone(),
        status,
        resource_type: exchange.resource_type.clone(),
        request_body_snippet: exchange
            .request_body
            .as_deref()
            .map(|body| decode_prefix(body, snippet_bytes)),
        response_headers,
    }
}
