//! Browser tools using Chrome `DevTools` Protocol
//!
//! Sessions are implicit: the first tool call for a conversation launches
//! Chrome, and network capture starts with the page.

pub mod session;
mod tools;

#[cfg(test)]
mod tests;

pub use session::{BrowserError, BrowserSession, BrowserSessionManager};
pub use tools::{BrowserNavigateTool, BrowserNetworkRequestTool, BrowserNetworkRequestsTool};
