//! Feeding a page's DevTools network events into a ledger

use super::exchange::{Exchange, ExchangeResponse, ExchangeSource, Headers};
use super::ledger::{AttachOutcome, Ledger};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chromiumoxide::cdp::browser_protocol::network::{
    self, EnableParams, EventRequestWillBeSent, EventResponseReceived, GetRequestPostDataParams,
    GetResponseBodyParams, RequestId, ResourceType,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Separates a DevTools request id from the redirect hop number in ledger ids
const HOP_SEPARATOR: char = '#';

/// DevTools request id behind a ledger id
fn engine_request_id(ledger_id: &str) -> &str {
    ledger_id.split(HOP_SEPARATOR).next().unwrap_or(ledger_id)
}

/// DevTools request id to fetch `exchange`'s body with. Only the last hop of
/// a redirect chain has a body behind that id.
fn body_request_id(exchange: &Exchange) -> Result<String, String> {
    if exchange.is_superseded() {
        return Err(format!(
            "Redirect response {} has no retrievable body",
            exchange.id
        ));
    }
    Ok(engine_request_id(&exchange.id).to_string())
}

/// DevTools reuses one request id for every hop of a redirect chain. Each
/// hop gets its own ledger entry: the first keeps the engine id, later ones
/// are `<id>#1`, `<id>#2`, ...
#[derive(Default)]
struct RedirectHops {
    current: HashMap<String, (String, usize)>,
}

impl RedirectHops {
    fn current(&self, engine_id: &str) -> Option<&str> {
        self.current.get(engine_id).map(|(id, _)| id.as_str())
    }

    fn next_hop(&mut self, engine_id: &str) -> String {
        let hop = self.current.get(engine_id).map_or(0, |(_, hop)| hop + 1);
        let ledger_id = if hop == 0 {
            engine_id.to_string()
        } else {
            format!("{engine_id}{HOP_SEPARATOR}{hop}")
        };
        self.current
            .insert(engine_id.to_string(), (ledger_id.clone(), hop));
        ledger_id
    }
}

fn resource_type_name(resource_type: Option<&ResourceType>) -> String {
    resource_type.map_or_else(
        || "other".to_string(),
        |t| format!("{t:?}").to_lowercase(),
    )
}

/// Flatten DevTools headers, filling in `content-type` from the MIME type when absent
fn headers_from_cdp(headers: &network::Headers, mime_type: &str) -> Headers {
    let mut converted: Headers = headers
        .inner()
        .as_object()
        .into_iter()
        .flatten()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect();
    if !converted.contains("content-type") && !mime_type.is_empty() {
        converted.insert("content-type", mime_type);
    }
    converted
}

fn response_from_cdp(response: &network::Response) -> ExchangeResponse {
    ExchangeResponse::new(
        u16::try_from(response.status).unwrap_or_default(),
        headers_from_cdp(&response.headers, &response.mime_type),
    )
}

fn decode_body(body: &str, base64_encoded: bool) -> Result<Vec<u8>, String> {
    if base64_encoded {
        BASE64
            .decode(body)
            .map_err(|e| format!("Invalid base64 body: {e}"))
    } else {
        Ok(body.as_bytes().to_vec())
    }
}

/// Record one `requestWillBeSent` event. A redirect response in the event
/// answers the previous hop of the same request, which is then superseded.
fn record_request(
    ledger: &Ledger,
    hops: &mut RedirectHops,
    event: &EventRequestWillBeSent,
    post_data: Option<String>,
) {
    let engine_id = event.request_id.inner();

    if let Some(redirect) = &event.redirect_response {
        if let Some(previous) = hops.current(engine_id) {
            ledger.attach_response(previous, response_from_cdp(redirect));
            if let Some(exchange) = ledger.lookup(previous) {
                exchange.mark_superseded();
            }
        }
    }

    let ledger_id = hops.next_hop(engine_id);
    let mut exchange = Exchange::new(
        ledger_id,
        &event.request.method,
        event.request.url.clone(),
        &resource_type_name(event.r#type.as_ref()),
    );
    if let Some(body) = post_data {
        exchange = exchange.with_request_body(body);
    }

    tracing::trace!(request_id = %exchange.id, method = %exchange.method, url = %exchange.url, "Request recorded");
    ledger.record(exchange);
}

async fn request_post_data(page: &Page, event: &EventRequestWillBeSent) -> Option<String> {
    if event.request.has_post_data != Some(true) {
        return None;
    }
    match page
        .execute(GetRequestPostDataParams::new(event.request_id.clone()))
        .await
    {
        Ok(post) => Some(post.result.post_data.clone()),
        Err(e) => {
            tracing::debug!(request_id = %event.request_id.inner(), error = %e, "Request body unavailable");
            None
        }
    }
}

fn on_response(ledger: &Ledger, hops: &RedirectHops, event: &EventResponseReceived) {
    let engine_id = event.request_id.inner();
    let ledger_id = hops.current(engine_id).unwrap_or(engine_id);
    match ledger.attach_response(ledger_id, response_from_cdp(&event.response)) {
        AttachOutcome::Attached => {
            tracing::trace!(request_id = %ledger_id, status = event.response.status, "Response attached");
        }
        AttachOutcome::AlreadyAttached => {}
        AttachOutcome::UnknownExchange => {
            tracing::debug!(request_id = %ledger_id, "Response for unrecorded request");
        }
    }
}

/// Enable the Network domain on `page` and record its traffic into `ledger`
/// until the page's event streams close.
///
/// # Errors
///
/// Fails if the Network domain cannot be enabled or its events cannot be
/// subscribed to.
pub async fn start_capture(page: &Page, ledger: Arc<Ledger>) -> Result<JoinHandle<()>, CdpError> {
    page.execute(EnableParams::default()).await?;
    let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let page = page.clone();

    Ok(tokio::spawn(async move {
        let mut hops = RedirectHops::default();
        loop {
            // Requests first: a response must never be handled before the
            // request it answers, even when both are already queued.
            tokio::select! {
                biased;
                Some(event) = requests.next() => {
                    let post_data = request_post_data(&page, &event).await;
                    record_request(&ledger, &mut hops, &event, post_data);
                }
                Some(event) = responses.next() => {
                    on_response(&ledger, &hops, &event);
                }
                else => break,
            }
        }
        tracing::debug!(recorded = ledger.len(), "Network event streams closed");
    }))
}

/// Reads response data for recorded exchanges from a live page
pub struct CdpSource {
    page: Page,
}

impl CdpSource {
    pub fn new(page: Page) -> Self {
        Self { page }
    }
}

#[async_trait]
impl ExchangeSource for CdpSource {
    async fn response_headers(&self, exchange: &Exchange) -> Result<Headers, String> {
        exchange
            .response()
            .map(|response| response.headers.clone())
            .ok_or_else(|| format!("No response received for {}", exchange.id))
    }

    async fn response_body(&self, exchange: &Exchange) -> Result<Vec<u8>, String> {
        let params = GetResponseBodyParams::new(RequestId::new(body_request_id(exchange)?));
        let body = self.page.execute(params).await.map_err(|e| e.to_string())?;
        decode_body(&body.result.body, body.result.base64_encoded)
    }
}
