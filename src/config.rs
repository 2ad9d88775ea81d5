//! Configuration handling for the DBA MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use clap::{Parser, ValueEnum};

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Server identity reported in handshakes and on the HTTP root endpoint.
pub const SERVER_NAME: &str = "dba-mcp-server";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interval between heartbeat events on the push stream.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// How long the HTTP transport waits for in-flight requests during shutdown.
pub const GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// HTTP with Server-Sent Events (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Configuration for the DBA MCP Server.
///
/// Database credentials are not configured here: every tool invocation carries
/// its own connection fields, and the connection cache is keyed off those.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dba-mcp-server",
    about = "MCP server exposing DBA tools for SQL Server - ad-hoc queries and performance reports",
    version,
    author
)]
pub struct Config {
    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "DBA_MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "DBA_MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "DBA_MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "DBA_MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DBA_MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
