//! Browser tool implementations
//!
//! Navigation generates traffic; the two network tools list and render what
//! the page's ledger has recorded.

use super::session::BrowserSession;
use crate::config::parse_duration;
use crate::network::{FilterCriteria, RenderedBody};
use crate::tools::{Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// browser_navigate
// ============================================================================

#[derive(Debug, Deserialize)]
struct NavigateInput {
    url: String,
    #[serde(default)]
    timeout: Option<String>,
}

pub struct BrowserNavigateTool;

#[async_trait]
impl Tool for BrowserNavigateTool {
    fn name(&self) -> &'static str {
        "browser_navigate"
    }

    fn description(&self) -> String {
        "Navigate the browser to a specific URL and wait for page to load".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to navigate to"
                },
                "timeout": {
                    "type": "string",
                    "description": "Timeout as a Go duration string (default: 15s)"
                }
            },
            "required": ["url"]
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: NavigateInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let timeout = input
            .timeout
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_TIMEOUT);

        let session: Arc<RwLock<BrowserSession>> = match ctx.browser().await {
            Ok(s) => s,
            Err(e) => return ToolOutput::error(format!("Failed to get browser: {e}")),
        };

        // Clone the page out so listings are not blocked while the page loads
        let page = {
            let mut guard = session.write().await;
            guard.last_activity = std::time::Instant::now();
            guard.page.clone()
        };

        let result = tokio::time::timeout(timeout, page.goto(&input.url)).await;

        match result {
            Ok(Ok(_)) => ToolOutput::success("done"),
            Ok(Err(e)) => ToolOutput::error(format!("Navigation failed: {e}")),
            Err(_) => ToolOutput::error(format!("Timeout after {timeout:?} waiting for page load")),
        }
    }
}

// ============================================================================
// browser_network_requests
// ============================================================================

#[derive(Debug, Deserialize)]
struct NetworkRequestsInput {
    #[serde(default)]
    methods: Vec<String>,
    #[serde(default)]
    resource_types: Vec<String>,
}

pub struct BrowserNetworkRequestsTool;

#[async_trait]
impl Tool for BrowserNetworkRequestsTool {
    fn name(&self) -> &'static str {
        "browser_network_requests"
    }

    fn description(&self) -> String {
        r"List network requests the page has made, oldest first, one JSON object per line.
Each line has id, method, url, status (once answered), resourceType, requestBodySnippet and responseHeaders.
Filters: `methods` and `resource_types`. When both are given, a request matching EITHER filter is listed. Pass the id to browser_network_request to read the response body.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "methods": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "HTTP methods to include, e.g. [\"POST\"] (default: all)"
                },
                "resource_types": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Resource types to include, e.g. [\"xhr\", \"fetch\"] (default: all)"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: NetworkRequestsInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let Ok(session) = ctx.existing_browser().await else {
            return ToolOutput::success("No network requests recorded (no page has been opened)");
        };

        // Clone the handles out so the session lock is not held while headers load
        let inspector = session.read().await.inspector(ctx.network_limits());

        let criteria = FilterCriteria::new(&input.methods, &input.resource_types);
        let lines = inspector.list(&criteria).await;
        tracing::debug!(
            conversation_id = %ctx.conversation_id,
            matched = lines.len(),
            recorded = inspector.ledger().len(),
            "Listed network requests"
        );

        if !lines.is_empty() {
            ToolOutput::success(lines.join("\n"))
        } else if inspector.ledger().is_empty() {
            ToolOutput::success("No network requests recorded")
        } else {
            ToolOutput::success("No network requests match the given filters")
        }
    }
}

// ============================================================================
// browser_network_request
// ============================================================================

#[derive(Debug, Deserialize)]
struct NetworkRequestInput {
    id: String,
    #[serde(default)]
    timeout: Option<String>,
}

pub struct BrowserNetworkRequestTool;

impl BrowserNetworkRequestTool {
    fn output_for(body: RenderedBody) -> ToolOutput {
        match body {
            RenderedBody::Image {
                ref bytes,
                ref content_type,
            } => ToolOutput::success(body.to_string()).with_display(json!({
                "type": "image",
                "media_type": content_type,
                "data": BASE64.encode(bytes),
            })),
            other => ToolOutput::success(other.to_string()),
        }
    }
}

#[async_trait]
impl Tool for BrowserNetworkRequestTool {
    fn name(&self) -> &'static str {
        "browser_network_request"
    }

    fn description(&self) -> String {
        r"Show the response body of one network request, by the id from browser_network_requests.
JSON is shortened structurally (long arrays and strings are cut with a note of their original length), text is cut to a fixed size, images are returned whole. Other binary types are not shown.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Request id from browser_network_requests"
                },
                "timeout": {
                    "type": "string",
                    "description": "Timeout as a Go duration string (default: 15s)"
                }
            },
            "required": ["id"]
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: NetworkRequestInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let timeout = input
            .timeout
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_TIMEOUT);

        let session = match ctx.existing_browser().await {
            Ok(s) => s,
            Err(_) => {
                return ToolOutput::error(format!(
                    "No network request with id {} (no page has been opened)",
                    input.id
                ))
            }
        };
        let inspector = {
            let mut guard = session.write().await;
            guard.last_activity = std::time::Instant::now();
            guard.inspector(ctx.network_limits())
        };

        tokio::select! {
            () = ctx.cancel.cancelled() => ToolOutput::error(format!("Cancelled while fetching {}", input.id)),
            result = tokio::time::timeout(timeout, inspector.render(&input.id)) => match result {
                Ok(Ok(body)) => Self::output_for(body),
                Ok(Err(e)) => ToolOutput::error(e.to_string()),
                Err(_) => ToolOutput::error(format!(
                    "Timeout after {timeout:?} fetching response for {}",
                    input.id
                )),
            },
        }
    }
}
