//! DBA MCP Server Library
//!
//! MCP tools for AI assistants to run ad-hoc SQL and stored-procedure
//! performance reports against Microsoft SQL Server. Connections are cached
//! per (server, database, user, port) and verified before reuse.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{DbaError, DbaResult};
pub use tools::Dispatcher;
