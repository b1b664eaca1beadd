//! Tests for the browser tools
//!
//! Tests that need Chrome are `#[ignore]`d; run them with
//! `cargo test -- --ignored`. Chromium is auto-downloaded via the fetcher
//! if not in PATH.

use super::session::BrowserSessionManager;
use super::tools::*;
use crate::tools::{Tool, ToolContext};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Create a test context with a fresh browser session manager
fn test_context(conversation_id: &str) -> (ToolContext, Arc<BrowserSessionManager>) {
    let manager = Arc::new(BrowserSessionManager::default());
    let ctx = ToolContext::new(
        CancellationToken::new(),
        conversation_id.to_string(),
        manager.clone(),
    );
    (ctx, manager)
}

/// One canned HTTP response
struct Route {
    path: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

/// Paths under `/slow` are answered only after this delay
const SLOW_ROUTE_DELAY: Duration = Duration::from_secs(3);

/// Simple HTTP test server that serves static routes
struct TestServer {
    addr: std::net::SocketAddr,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(routes);
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accept = listener.accept() => {
                        if let Ok((mut socket, _)) = accept {
                            let routes = routes.clone();
                            tokio::spawn(async move {
                                let mut buf = [0u8; 4096];
                                let n = socket.read(&mut buf).await.unwrap_or(0);
                                let request = String::from_utf8_lossy(&buf[..n]);
                                let path = request.split_whitespace().nth(1).unwrap_or("/");
                                if path.starts_with("/slow") {
                                    tokio::time::sleep(SLOW_ROUTE_DELAY).await;
                                }

                                let (status, content_type, body) = match routes.iter().find(|r| r.path == path) {
                                    Some(route) => ("200 OK", route.content_type, route.body.clone()),
                                    None => ("404 Not Found", "text/plain", b"not found".to_vec()),
                                };
                                let head = format!(
                                    "HTTP/1.1 {status}\r\n\
                                     Content-Type: {content_type}\r\n\
                                     Content-Length: {}\r\n\
                                     Connection: close\r\n\
                                     \r\n",
                                    body.len()
                                );
                                let _ = socket.write_all(head.as_bytes()).await;
                                let _ = socket.write_all(&body).await;
                            });
                        }
                    }
                }
            }
        });

        Self {
            addr,
            shutdown: shutdown_tx,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

/// 1x1 transparent PNG
const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

fn traffic_routes() -> Vec<Route> {
    let page = r#"<!DOCTYPE html>
        <html>
        <head><title>Network Test</title></head>
        <body>
          <img src="/pixel.png">
          <script>
            fetch('/api/items', {method: 'POST', body: JSON.stringify({query: 'all'})})
              .then(r => r.json())
              .then(() => { document.title = 'loaded'; });
          </script>
        </body>
        </html>"#;
    let items: Vec<Value> = (0..8).map(|i| json!({"n": i})).collect();
    vec![
        Route {
            path: "/",
            content_type: "text/html",
            body: page.as_bytes().to_vec(),
        },
        Route {
            path: "/api/items",
            content_type: "application/json",
            body: json!({"items": items}).to_string().into_bytes(),
        },
        Route {
            path: "/pixel.png",
            content_type: "image/png",
            body: PIXEL_PNG.to_vec(),
        },
    ]
}

/// Parse the listing into records keyed by path
fn records_by_path(output: &str) -> Vec<(String, Value)> {
    output
        .lines()
        .map(|line| {
            let record: Value = serde_json::from_str(line).unwrap();
            let url = record["url"].as_str().unwrap().to_string();
            let path = url
                .splitn(4, '/')
                .nth(3)
                .map_or_else(|| "/".to_string(), |p| format!("/{p}"));
            (path, record)
        })
        .collect()
}

// ============================================================================
// Tests without a browser
// ============================================================================

#[tokio::test]
async fn test_list_without_session() {
    let (ctx, _manager) = test_context("test-list-no-session");
    let result = BrowserNetworkRequestsTool.run(json!({}), ctx).await;
    assert!(result.success);
    assert!(result.output.contains("No network requests recorded"));
}

#[tokio::test]
async fn test_render_without_session() {
    let (ctx, _manager) = test_context("test-render-no-session");
    let result = BrowserNetworkRequestTool.run(json!({"id": "1.1"}), ctx).await;
    assert!(!result.success);
    assert!(result.output.contains("1.1"), "{}", result.output);
}

#[tokio::test]
async fn test_invalid_inputs() {
    let (ctx, _manager) = test_context("test-invalid-inputs");

    let result = BrowserNetworkRequestTool.run(json!({}), ctx.clone()).await;
    assert!(!result.success);
    assert!(result.output.starts_with("Invalid input"));

    let result = BrowserNetworkRequestsTool
        .run(json!({"methods": "GET"}), ctx.clone())
        .await;
    assert!(!result.success);
    assert!(result.output.starts_with("Invalid input"));

    let result = BrowserNavigateTool.run(json!({"href": "x"}), ctx).await;
    assert!(!result.success);
    assert!(result.output.starts_with("Invalid input"));
}

// ============================================================================
// Local server tests (need Chrome)
// ============================================================================

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_network_capture_and_render() {
    let server = TestServer::start(traffic_routes()).await;
    let (ctx, manager) = test_context("test-network-capture");

    let nav = BrowserNavigateTool
        .run(json!({"url": server.url("/")}), ctx.clone())
        .await;
    assert!(nav.success, "Navigate failed: {}", nav.output);

    // Let the page's fetch settle
    tokio::time::sleep(Duration::from_millis(500)).await;

    let listing = BrowserNetworkRequestsTool.run(json!({}), ctx.clone()).await;
    assert!(listing.success, "List failed: {}", listing.output);
    let records = records_by_path(&listing.output);
    let paths: Vec<&str> = records.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths.first(), Some(&"/"), "document first: {paths:?}");
    assert!(paths.contains(&"/api/items"), "{paths:?}");
    assert!(paths.contains(&"/pixel.png"), "{paths:?}");

    let (_, api) = records.iter().find(|(p, _)| p == "/api/items").unwrap();
    assert_eq!(api["method"], "POST");
    assert_eq!(api["resourceType"], "fetch");
    assert_eq!(api["status"], 200);
    assert_eq!(api["requestBodySnippet"], r#"{"query":"all"}"#);

    // JSON body: 8 items cut to 5 plus a note
    let body = BrowserNetworkRequestTool
        .run(json!({"id": api["id"]}), ctx.clone())
        .await;
    assert!(body.success, "Render failed: {}", body.output);
    let rendered: Value = serde_json::from_str(&body.output).unwrap();
    let items = rendered["items"].as_array().unwrap();
    assert_eq!(items.len(), 6);
    assert_eq!(items[5], "... (truncated, original length: 8)");

    // Image body comes back whole
    let (_, pixel) = records.iter().find(|(p, _)| p == "/pixel.png").unwrap();
    let image = BrowserNetworkRequestTool
        .run(json!({"id": pixel["id"]}), ctx.clone())
        .await;
    assert!(image.success, "Render failed: {}", image.output);
    let display = image.display_data.unwrap();
    assert_eq!(display["media_type"], "image/png");
    let data = base64::Engine::decode(
        &base64::engine::general_purpose::STANDARD,
        display["data"].as_str().unwrap(),
    )
    .unwrap();
    assert_eq!(data, PIXEL_PNG);

    // Filters
    let posts = BrowserNetworkRequestsTool
        .run(json!({"methods": ["POST"]}), ctx.clone())
        .await;
    let post_paths: Vec<String> = records_by_path(&posts.output)
        .into_iter()
        .map(|(p, _)| p)
        .collect();
    assert_eq!(post_paths, ["/api/items"]);

    let images = BrowserNetworkRequestsTool
        .run(json!({"resource_types": ["image"]}), ctx.clone())
        .await;
    assert!(images.output.contains("/pixel.png"));
    assert!(!images.output.contains("/api/items"));

    // Unknown id
    let missing = BrowserNetworkRequestTool
        .run(json!({"id": "no-such-request"}), ctx)
        .await;
    assert!(!missing.success);
    assert_eq!(missing.output, "No network request with id no-such-request");

    manager.shutdown_all().await;
    server.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_ledger_persists_across_navigations() {
    let server = TestServer::start(vec![
        Route {
            path: "/one",
            content_type: "text/html",
            body: b"<p>one</p>".to_vec(),
        },
        Route {
            path: "/two",
            content_type: "text/plain",
            body: b"two".to_vec(),
        },
    ])
    .await;
    let (ctx, manager) = test_context("test-network-persist");

    for path in ["/one", "/two"] {
        let nav = BrowserNavigateTool
            .run(json!({"url": server.url(path)}), ctx.clone())
            .await;
        assert!(nav.success, "Navigate failed: {}", nav.output);
    }

    let listing = BrowserNetworkRequestsTool
        .run(json!({"resource_types": ["document"]}), ctx.clone())
        .await;
    let paths: Vec<String> = records_by_path(&listing.output)
        .into_iter()
        .map(|(p, _)| p)
        .collect();
    let one = paths.iter().position(|p| p == "/one");
    let two = paths.iter().position(|p| p == "/two");
    assert!(one.is_some() && two.is_some(), "{paths:?}");
    assert!(one < two, "chronological order: {paths:?}");

    let (_, two_record) = records_by_path(&listing.output)
        .into_iter()
        .find(|(p, _)| p == "/two")
        .unwrap();
    let text = BrowserNetworkRequestTool
        .run(json!({"id": two_record["id"]}), ctx)
        .await;
    assert!(text.success, "Render failed: {}", text.output);
    assert_eq!(text.output, "two");

    manager.shutdown_all().await;
    server.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_listing_not_blocked_by_navigation() {
    let server = TestServer::start(vec![
        Route {
            path: "/",
            content_type: "text/html",
            body: b"<p>start</p>".to_vec(),
        },
        Route {
            path: "/slow",
            content_type: "text/html",
            body: b"<p>slow</p>".to_vec(),
        },
    ])
    .await;
    let (ctx, manager) = test_context("test-network-nav-lock");

    let nav = BrowserNavigateTool
        .run(json!({"url": server.url("/")}), ctx.clone())
        .await;
    assert!(nav.success, "Navigate failed: {}", nav.output);

    let slow_ctx = ctx.clone();
    let slow_url = server.url("/slow");
    let slow_nav = tokio::spawn(async move {
        BrowserNavigateTool
            .run(json!({"url": slow_url}), slow_ctx)
            .await
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let listing = tokio::time::timeout(
        Duration::from_secs(1),
        BrowserNetworkRequestsTool.run(json!({}), ctx.clone()),
    )
    .await
    .expect("listing waited for the navigation to finish");
    assert!(listing.success, "List failed: {}", listing.output);
    assert!(listing.output.contains(&server.url("/")), "{}", listing.output);

    assert!(slow_nav.await.unwrap().success);
    manager.shutdown_all().await;
    server.shutdown().await;
}
