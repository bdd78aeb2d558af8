//! Core types, error handling, and settings for prr.
//!
//! This crate provides the foundational abstractions shared by the
//! GitHub engine, the MCP server, and the CLI.

pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use config::Settings;
pub use error::{Error, Result};
pub use provider::{GitContextSource, PrProvider, ResolveRequest};
pub use types::{
    FetchLimits, FetchOverrides, GitContext, ReviewComment, SelectStrategy,
};
