//! Phoenix netlog - load a page and report its network traffic
//!
//! Usage: `phoenix-netlog <url> [request-id ...]`
//!
//! Lists every request the page made, then renders the response body of
//! each request id given after the URL.

use phoenix_netlog::config::parse_duration;
use phoenix_netlog::tools::{BrowserSessionManager, ToolContext, ToolRegistry};
use phoenix_netlog::NetworkLimits;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SETTLE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phoenix_netlog=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .ok_or("usage: phoenix-netlog <url> [request-id ...]")?;
    let render_ids: Vec<String> = args.collect();

    let settle = std::env::var("PHOENIX_NETLOG_SETTLE")
        .ok()
        .and_then(|s| parse_duration(&s))
        .unwrap_or(DEFAULT_SETTLE);
    let limits = NetworkLimits::from_env();
    tracing::info!(?limits, ?settle, "Configuration loaded");

    let manager = BrowserSessionManager::new(limits);
    let registry = ToolRegistry::standard();
    let ctx = ToolContext::new(CancellationToken::new(), "cli".to_string(), manager.clone());

    let outcome = run(&registry, &ctx, &url, &render_ids, settle).await;
    manager.shutdown_all().await;
    outcome
}

async fn run(
    registry: &ToolRegistry,
    ctx: &ToolContext,
    url: &str,
    render_ids: &[String],
    settle: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let navigation = registry
        .execute("browser_navigate", json!({ "url": url }), ctx.clone())
        .await
        .ok_or("browser_navigate is not registered")?;
    if !navigation.success {
        return Err(navigation.output.into());
    }

    // Give late fetches and images a chance to complete
    tokio::time::sleep(settle).await;

    let listing = registry
        .execute("browser_network_requests", json!({}), ctx.clone())
        .await
        .ok_or("browser_network_requests is not registered")?;
    println!("{}", listing.output);

    for id in render_ids {
        let rendered = registry
            .execute("browser_network_request", json!({ "id": id }), ctx.clone())
            .await
            .ok_or("browser_network_request is not registered")?;
        println!();
        println!("== {id}");
        println!("{}", rendered.output);
        if !rendered.success {
            tracing::warn!(request_id = %id, "Render failed");
        }
    }

    Ok(())
}
