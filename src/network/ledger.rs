//! Append-only record of a page's network exchanges

use super::exchange::{Exchange, ExchangeResponse};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Result of attaching a response to a recorded exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached,
    /// A response was already attached; the new one was ignored
    AlreadyAttached,
    UnknownExchange,
}

#[derive(Default)]
struct LedgerInner {
    entries: Vec<Arc<Exchange>>,
    index: HashMap<String, usize>,
}

/// Per-session store of exchanges in the order their requests started.
///
/// Entries are never removed. The lock only guards the sequence and the id
/// index; a response is attached through the exchange's own write-once slot,
/// so attachment never needs the write lock.
#[derive(Default)]
pub struct Ledger {
    inner: RwLock<LedgerInner>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pending exchange. Returns `None` if the id is already recorded.
    pub fn record(&self, exchange: Exchange) -> Option<Arc<Exchange>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.index.contains_key(&exchange.id) {
            tracing::debug!(request_id = %exchange.id, "Ignoring duplicate request id");
            return None;
        }
        let exchange = Arc::new(exchange);
        let position = inner.entries.len();
        inner.index.insert(exchange.id.clone(), position);
        inner.entries.push(exchange.clone());
        Some(exchange)
    }

    pub fn attach_response(&self, id: &str, response: ExchangeResponse) -> AttachOutcome {
        let Some(exchange) = self.lookup(id) else {
            return AttachOutcome::UnknownExchange;
        };
        if exchange.attach(response) {
            AttachOutcome::Attached
        } else {
            AttachOutcome::AlreadyAttached
        }
    }

    /// Snapshot of every exchange in chronological order.
    ///
    /// Later records do not change the snapshot's length, but responses that
    /// arrive afterwards are visible through the shared entries.
    pub fn all(&self) -> Vec<Arc<Exchange>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<Arc<Exchange>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .index
            .get(id)
            .and_then(|&position| inner.entries.get(position))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
