//! Data models for the DBA MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionInfo, ConnectionKey, DEFAULT_SQL_PORT};
pub use query::{QueryResult, ReportMetadata, Row};
