//! Exchange records and the accessor trait used to read response data

use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Response headers in arrival order, looked up case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value whose name matches `name`, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Status line and headers of a received response. The body is fetched
/// on demand through an [`ExchangeSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResponse {
    pub status: u16,
    pub headers: Headers,
}

impl ExchangeResponse {
    pub fn new(status: u16, headers: Headers) -> Self {
        Self { status, headers }
    }
}

/// One network request and, once it arrives, its response.
///
/// The response slot is written at most once; after that every reader sees
/// the same fully-built response.
#[derive(Debug)]
pub struct Exchange {
    pub id: String,
    /// Uppercase HTTP verb
    pub method: String,
    pub url: String,
    /// Lowercase resource category (document, script, xhr, fetch, ...)
    pub resource_type: String,
    pub request_body: Option<Vec<u8>>,
    response: OnceLock<ExchangeResponse>,
    /// Set when the response was a redirect followed by another hop
    superseded: AtomicBool,
}

impl Exchange {
    pub fn new(
        id: impl Into<String>,
        method: &str,
        url: impl Into<String>,
        resource_type: &str,
    ) -> Self {
        Self {
            id: id.into(),
            method: method.to_ascii_uppercase(),
            url: url.into(),
            resource_type: resource_type.to_ascii_lowercase(),
            request_body: None,
            response: OnceLock::new(),
            superseded: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_request_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.request_body = Some(body.into());
        self
    }

    pub fn response(&self) -> Option<&ExchangeResponse> {
        self.response.get()
    }

    pub fn is_pending(&self) -> bool {
        self.response.get().is_none()
    }

    /// True once a later redirect hop has replaced this exchange. The engine
    /// keeps only the final hop's body, so this one has none to fetch.
    pub fn is_superseded(&self) -> bool {
        self.superseded.load(Ordering::Acquire)
    }

    pub(crate) fn mark_superseded(&self) {
        self.superseded.store(true, Ordering::Release);
    }

    /// Fill the response slot. Returns false if a response was already attached.
    pub(crate) fn attach(&self, response: ExchangeResponse) -> bool {
        self.response.set(response).is_ok()
    }
}

/// Asynchronous access to response data held by the browser engine.
///
/// Both calls may suspend on a round trip to the engine. Errors are plain
/// messages; callers decide how much of them to surface.
#[async_trait]
pub trait ExchangeSource: Send + Sync {
    /// Full response headers for an answered exchange
    async fn response_headers(&self, exchange: &Exchange) -> Result<Headers, String>;

    /// Raw response body bytes for an answered exchange
    async fn response_body(&self, exchange: &Exchange) -> Result<Vec<u8>, String>;
}
