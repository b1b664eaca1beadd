//! In-memory `ExchangeSource` for tests

use super::exchange::{Exchange, ExchangeSource, Headers};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Serves canned bodies by exchange id. Headers come from the recorded
/// response, the way the CDP source serves them.
#[derive(Default)]
pub struct StaticSource {
    bodies: HashMap<String, Result<Vec<u8>, String>>,
    header_failures: HashMap<String, String>,
    header_delays: HashMap<String, Duration>,
    body_fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, id: &str, body: &[u8]) -> Self {
        self.bodies.insert(id.to_string(), Ok(body.to_vec()));
        self
    }

    pub fn with_failure(mut self, id: &str, message: &str) -> Self {
        self.bodies.insert(id.to_string(), Err(message.to_string()));
        self
    }

    pub fn with_header_failure(mut self, id: &str, message: &str) -> Self {
        self.header_failures
            .insert(id.to_string(), message.to_string());
        self
    }

    /// Delay header retrieval for `id`, to make completion order differ from ledger order
    pub fn with_header_delay(mut self, id: &str, delay: Duration) -> Self {
        self.header_delays.insert(id.to_string(), delay);
        self
    }

    pub fn body_fetches(&self) -> usize {
        self.body_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeSource for StaticSource {
    async fn response_headers(&self, exchange: &Exchange) -> Result<Headers, String> {
        if let Some(delay) = self.header_delays.get(&exchange.id) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(message) = self.header_failures.get(&exchange.id) {
            return Err(message.clone());
        }
        exchange
            .response()
            .map(|r| r.headers.clone())
            .ok_or_else(|| "no response".to_string())
    }

    async fn response_body(&self, exchange: &Exchange) -> Result<Vec<u8>, String> {
        self.body_fetches.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .get(&exchange.id)
            .cloned()
            .unwrap_or_else(|| Err(format!("no body for {}", exchange.id)))
    }
}
