//! Network activity ledger and response rendering
//!
//! A browser session records every request its page makes into a
//! [`Ledger`]. Tools read that ledger through a [`NetworkInspector`]: listing
//! filtered summaries, or rendering one response body under size budgets.

mod capture;
mod classify;
mod exchange;
mod filter;
mod ledger;
mod projector;
mod render;
#[cfg(test)]
pub(crate) mod testing;
mod truncate;

pub use capture::{start_capture, CdpSource};
pub use classify::{classify, content_type, ContentKind};
pub use exchange::{Exchange, ExchangeResponse, ExchangeSource, Headers};
pub use filter::{select, FilterCriteria};
pub use ledger::{AttachOutcome, Ledger};
pub use projector::{project, SummaryRecord};
pub use render::{render, RenderedBody};
pub use truncate::{serialize_with_ceiling, truncate_bytes, truncate_structure};

use crate::config::NetworkLimits;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("No network request with id {0}")]
    NotFound(String),

    #[error("Network request {0} has not received a response yet")]
    NoResponse(String),

    #[error("Failed to fetch response for {id}: {message}")]
    Fetch { id: String, message: String },
}

impl NetworkError {
    /// Fetch failure keeping only the first line of the engine's message
    pub fn fetch(id: &str, message: &str) -> Self {
        Self::Fetch {
            id: id.to_string(),
            message: message.lines().next().unwrap_or_default().trim().to_string(),
        }
    }
}

/// Read-only view over one session's ledger
#[derive(Clone)]
pub struct NetworkInspector {
    ledger: Arc<Ledger>,
    source: Arc<dyn ExchangeSource>,
    limits: NetworkLimits,
}

impl NetworkInspector {
    pub fn new(ledger: Arc<Ledger>, source: Arc<dyn ExchangeSource>, limits: NetworkLimits) -> Self {
        Self {
            ledger,
            source,
            limits,
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// One JSON line per matching exchange, in the order requests started.
    ///
    /// Header fetches for all matches run concurrently; output order follows
    /// the ledger regardless of which fetch finishes first.
    pub async fn list(&self, criteria: &FilterCriteria) -> Vec<String> {
        let selected = select(&self.ledger.all(), criteria);
        let records = futures::future::join_all(selected.iter().map(|exchange| {
            project(
                exchange,
                self.source.as_ref(),
                self.limits.request_body_snippet_bytes,
            )
        }))
        .await;

        records
            .iter()
            .filter_map(|record| match serde_json::to_string(record) {
                Ok(line) => Some(line),
                Err(e) => {
                    tracing::warn!(request_id = %record.id, error = %e, "Failed to serialize summary");
                    None
                }
            })
            .collect()
    }

    /// Render one exchange's response body.
    ///
    /// # Errors
    ///
    /// Same as [`fn@render`].
    pub async fn render(&self, id: &str) -> Result<RenderedBody, NetworkError> {
        render(&self.ledger, self.source.as_ref(), id, &self.limits).await
    }
}
