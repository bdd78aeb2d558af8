//! MCP (Model Context Protocol) server for PR review comments.
//!
//! Implements the MCP stdio server that exposes PR review comment
//! fetching and open-PR resolution to AI assistants.

pub mod handlers;
pub mod protocol;
pub mod server;
pub mod transport;

pub use handlers::ToolHandler;
pub use server::McpServer;
