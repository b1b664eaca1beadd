//! Phoenix netlog - network inspection for agent-driven browser sessions
//!
//! Records every request a browser page makes and renders response bodies
//! within fixed size budgets, exposed to agents as a small set of tools.

#![allow(clippy::must_use_candidate)] // pure helpers carry an explicit #[must_use]

pub mod config;
pub mod network;
pub mod tools;

pub use config::NetworkLimits;
