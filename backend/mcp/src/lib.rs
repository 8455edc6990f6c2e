//! MCP client for tool providers.
//!
//! Speaks the streamable-HTTP transport: JSON-RPC 2.0 requests are POSTed to the
//! provider URL and replies arrive either as `application/json` or as a
//! `text/event-stream` body.

pub mod client;
pub mod error;
pub mod jsonrpc;

pub use client::{McpSession, McpSessionFactory, PROTOCOL_VERSION};
pub use error::McpError;
