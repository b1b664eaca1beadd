//! Browser session management
//!
//! One headless Chrome per conversation, created on first use. Each session
//! records its page's network traffic from the moment the page exists.

use crate::config::NetworkLimits;
use crate::network::{start_capture, CdpSource, Ledger, NetworkInspector};
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    fetcher::{BrowserFetcher, BrowserFetcherOptions},
    Page,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Idle timeout before session cleanup (30 minutes)
const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Cleanup check interval (60 seconds)
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Default viewport dimensions
const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 720;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Session not found for conversation: {0}")]
    SessionNotFound(String),

    #[error("Chrome not available: {0}")]
    ChromeNotAvailable(String),

    #[error("Failed to start network capture: {0}")]
    CaptureFailed(String),
}

/// Per-conversation browser instance
pub struct BrowserSession {
    #[allow(dead_code)] // Browser must stay alive
    browser: Browser,
    handler_task: JoinHandle<()>,
    capture_task: Option<JoinHandle<()>>,
    /// The current page (public for tool access)
    pub page: Page,
    /// Every network exchange the page has made
    pub network: Arc<Ledger>,
    /// Last activity timestamp (for idle timeout)
    pub last_activity: Instant,
}

impl BrowserSession {
    /// Directory where the fetcher caches downloaded Chrome binaries
    pub(crate) fn fetcher_cache_dir() -> PathBuf {
        let base = std::env::var("HOME").map_or_else(|_| PathBuf::from("/tmp"), PathBuf::from);
        base.join(".cache/phoenix-netlog/chromium")
    }

    fn user_data_dir(conversation_id: &str) -> String {
        format!("/tmp/phoenix-netlog-chrome-{conversation_id}")
    }

    /// Build a `BrowserConfig` with optional explicit Chrome executable path
    fn browser_config(
        conversation_id: &str,
        executable: Option<&Path>,
    ) -> Result<BrowserConfig, BrowserError> {
        let user_data_dir = Self::user_data_dir(conversation_id);

        // Remove stale user data directory to avoid Chrome SingletonLock conflicts
        let _ = std::fs::remove_dir_all(&user_data_dir);

        let mut builder = BrowserConfig::builder()
            .new_headless_mode()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer")
            .user_data_dir(&user_data_dir)
            .viewport(chromiumoxide::handler::viewport::Viewport {
                width: DEFAULT_VIEWPORT_WIDTH,
                height: DEFAULT_VIEWPORT_HEIGHT,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            });

        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|e| BrowserError::LaunchFailed(e.clone()))
    }

    /// Launch browser and open a blank page
    async fn launch_and_init(
        conversation_id: &str,
        executable: Option<&Path>,
    ) -> Result<Self, BrowserError> {
        let config = Self::browser_config(conversation_id, executable)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!("CDP handler error: {e}");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        Ok(Self {
            browser,
            handler_task,
            capture_task: None,
            page,
            network: Arc::new(Ledger::new()),
            last_activity: Instant::now(),
        })
    }

    /// Create a new browser session.
    ///
    /// Tries system Chrome first (zero download). On failure, downloads a
    /// compatible Chromium via `BrowserFetcher` and caches it for future runs.
    async fn new(conversation_id: &str) -> Result<Self, BrowserError> {
        match Self::launch_and_init(conversation_id, None).await {
            Ok(session) => return Ok(session),
            Err(e) => {
                tracing::info!("System Chrome not available ({e}), trying fetcher...");
            }
        }

        let cache_dir = Self::fetcher_cache_dir();
        tracing::info!("Downloading Chrome to {cache_dir:?} (first run only)...");

        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            BrowserError::ChromeNotAvailable(format!(
                "Failed to create cache dir {}: {e}",
                cache_dir.display()
            ))
        })?;

        let fetcher_opts = BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .map_err(|e| BrowserError::ChromeNotAvailable(format!("Fetcher config error: {e}")))?;

        let fetcher = BrowserFetcher::new(fetcher_opts);
        let info = fetcher.fetch().await.map_err(|e| {
            BrowserError::ChromeNotAvailable(format!("Chrome download failed: {e:#}"))
        })?;

        tracing::info!("Using Chrome at {:?}", info.executable_path);

        Self::launch_and_init(conversation_id, Some(&info.executable_path)).await
    }

    /// Start recording the page's network traffic into `network`
    async fn start_network_capture(&mut self) -> Result<(), BrowserError> {
        let task = capture_started(start_capture(&self.page, self.network.clone()).await)?;
        self.capture_task = Some(task);
        Ok(())
    }

    /// Listing and rendering view over this session's traffic
    pub fn inspector(&self, limits: NetworkLimits) -> NetworkInspector {
        NetworkInspector::new(
            self.network.clone(),
            Arc::new(CdpSource::new(self.page.clone())),
            limits,
        )
    }
}

/// A session whose traffic is not being recorded has nothing to offer, so a
/// capture that fails to start fails the whole session.
fn capture_started(
    result: Result<JoinHandle<()>, chromiumoxide::error::CdpError>,
) -> Result<JoinHandle<()>, BrowserError> {
    result.map_err(|e| BrowserError::CaptureFailed(e.to_string()))
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        self.handler_task.abort();
    }
}

/// Global manager for all browser sessions
pub struct BrowserSessionManager {
    sessions: RwLock<HashMap<String, Arc<RwLock<BrowserSession>>>>,
    limits: NetworkLimits,
}

impl BrowserSessionManager {
    /// Create a new session manager and start cleanup task
    pub fn new(limits: NetworkLimits) -> Arc<Self> {
        let manager = Arc::new(Self::with_limits(limits));

        // Weak reference so the cleanup loop does not keep the manager alive
        let manager_weak = Arc::downgrade(&manager);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_INTERVAL).await;
                if let Some(manager) = manager_weak.upgrade() {
                    manager.cleanup_idle_sessions().await;
                } else {
                    tracing::debug!("BrowserSessionManager dropped, cleanup task exiting");
                    break;
                }
            }
        });

        manager
    }

    /// Manager without a cleanup task
    pub fn with_limits(limits: NetworkLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Output budgets used when rendering network data
    pub fn limits(&self) -> NetworkLimits {
        self.limits
    }

    /// Get a session for a conversation (creates if needed)
    /// Returns Arc to the session - caller manages locking
    ///
    /// # Errors
    ///
    /// Fails if Chrome cannot be launched or the page's network capture
    /// cannot be started; no session is kept in either case.
    pub async fn get_session(
        &self,
        conversation_id: &str,
    ) -> Result<Arc<RwLock<BrowserSession>>, BrowserError> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(conversation_id) {
                return Ok(session.clone());
            }
        }

        let mut sessions = self.sessions.write().await;

        // Double-check after acquiring write lock
        if let Some(session) = sessions.get(conversation_id) {
            return Ok(session.clone());
        }

        tracing::info!(conversation_id, "Creating new browser session");
        let mut session = BrowserSession::new(conversation_id).await?;

        if let Err(e) = session.start_network_capture().await {
            tracing::warn!(conversation_id, error = %e, "Failed to start network capture");
            drop(session);
            let _ = tokio::fs::remove_dir_all(BrowserSession::user_data_dir(conversation_id)).await;
            return Err(e);
        }

        let session_arc = Arc::new(RwLock::new(session));
        sessions.insert(conversation_id.to_string(), session_arc.clone());

        Ok(session_arc)
    }

    /// Get an existing session without creating one
    ///
    /// # Errors
    ///
    /// `SessionNotFound` if the conversation has no session.
    pub async fn existing_session(
        &self,
        conversation_id: &str,
    ) -> Result<Arc<RwLock<BrowserSession>>, BrowserError> {
        self.sessions
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| BrowserError::SessionNotFound(conversation_id.to_string()))
    }

    /// Kill a specific session (called on conversation delete)
    pub async fn kill_session(&self, conversation_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.remove(conversation_id) {
            tracing::info!(conversation_id, "Killing browser session");
            drop(session);

            let user_data_dir = BrowserSession::user_data_dir(conversation_id);
            if let Err(e) = tokio::fs::remove_dir_all(&user_data_dir).await {
                tracing::warn!(path = %user_data_dir, error = %e, "Failed to clean up browser data dir");
            }
        }
    }

    /// Kill all sessions (called on shutdown)
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        if !ids.is_empty() {
            tracing::info!(count = ids.len(), "Shutting down all browser sessions");
        }
        for conversation_id in ids {
            self.kill_session(&conversation_id).await;
        }
    }

    /// Clean up sessions that have been idle too long
    async fn cleanup_idle_sessions(&self) {
        let now = Instant::now();
        let mut to_remove = Vec::new();

        {
            let sessions = self.sessions.read().await;
            for (conv_id, session) in sessions.iter() {
                if let Ok(guard) = session.try_read() {
                    if now.duration_since(guard.last_activity) > IDLE_TIMEOUT {
                        to_remove.push(conv_id.clone());
                    }
                }
            }
        }

        if !to_remove.is_empty() {
            let mut sessions = self.sessions.write().await;
            for conv_id in to_remove {
                tracing::info!(conversation_id = %conv_id, "Cleaning up idle browser session");
                sessions.remove(&conv_id);
            }
        }
    }
}

impl Default for BrowserSessionManager {
    fn default() -> Self {
        Self::with_limits(NetworkLimits::default())
    }
}
