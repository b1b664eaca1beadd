//! Tool surface over browser sessions
//!
//! Tools are stateless singletons; everything a call needs arrives through
//! [`ToolContext`].

pub mod browser;

pub use browser::{
    BrowserError, BrowserNavigateTool, BrowserNetworkRequestTool, BrowserNetworkRequestsTool,
    BrowserSession, BrowserSessionManager,
};

use crate::config::NetworkLimits;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Result from tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_data: Option<Value>,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            display_data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
            display_data: None,
        }
    }

    #[must_use]
    pub fn with_display(mut self, data: Value) -> Self {
        self.display_data = Some(data);
        self
    }
}

/// Name, description and input schema of a tool, as offered to an agent
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// All context needed for a tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    /// Cancellation signal for long-running operations
    pub cancel: CancellationToken,

    /// The conversation this tool is executing within
    pub conversation_id: String,

    /// Browser session manager (access via `browser()` method)
    browser_sessions: Arc<BrowserSessionManager>,
}

impl ToolContext {
    pub fn new(
        cancel: CancellationToken,
        conversation_id: String,
        browser_sessions: Arc<BrowserSessionManager>,
    ) -> Self {
        Self {
            cancel,
            conversation_id,
            browser_sessions,
        }
    }

    /// Get or create the browser session for this conversation.
    ///
    /// Lazily initializes Chrome on first call. Subsequent calls return
    /// the existing session.
    ///
    /// # Errors
    ///
    /// Fails if Chrome cannot be launched or network capture cannot start.
    pub async fn browser(&self) -> Result<Arc<RwLock<BrowserSession>>, BrowserError> {
        self.browser_sessions
            .get_session(&self.conversation_id)
            .await
    }

    /// The browser session for this conversation, only if one was already started
    ///
    /// # Errors
    ///
    /// `SessionNotFound` if no tool has opened a page yet.
    pub async fn existing_browser(&self) -> Result<Arc<RwLock<BrowserSession>>, BrowserError> {
        self.browser_sessions
            .existing_session(&self.conversation_id)
            .await
    }

    pub fn network_limits(&self) -> NetworkLimits {
        self.browser_sessions.limits()
    }
}

/// Trait for tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool with all context provided via `ToolContext`
    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput;
}

/// Collection of tools available to conversations
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn standard() -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(BrowserNavigateTool),
            Arc::new(BrowserNetworkRequestsTool),
            Arc::new(BrowserNetworkRequestTool),
        ];
        Self { tools }
    }

    /// Get all tool definitions
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool by name with context
    pub async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Option<ToolOutput> {
        for tool in &self.tools {
            if tool.name() == name {
                return Some(tool.run(input, ctx).await);
            }
        }
        None
    }
}
