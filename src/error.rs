//! Error types for the DBA MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Tool-level failures are reported in-band as structured payloads, so the Display
//! strings here are wire-visible and must stay stable.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbaError {
    /// No registered driver matched the preference list.
    #[error("No suitable SQL Server driver found. Registered drivers: [{registered}]")]
    NoDriverAvailable { registered: String },

    /// Opening or probing a connection failed. The cache entry for the key
    /// is discarded, so the next call retries with a fresh connection.
    #[error("Connection failed for {connection_key}: {message}")]
    Connection {
        connection_key: String,
        message: String,
    },

    /// A statement failed on a live connection. The connection is treated as
    /// poisoned and evicted.
    #[error("Query execution failed for {connection_key}: {message}")]
    QueryExecution {
        connection_key: String,
        message: String,
    },

    /// Required tool arguments were absent. Lists every missing field.
    #[error("Missing required parameters: {}", missing.join(", "))]
    MissingParameters { missing: Vec<String> },

    #[error("Date parameters must be in YYYY-MM-DD format")]
    InvalidDateFormat,

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    /// Argument values of the wrong shape (e.g. product_list not an array).
    #[error("Invalid parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Transport-level failure (bind, stdio stream). Fatal at startup only.
    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl DbaError {
    /// Create a no-driver-available error from the registered driver names.
    pub fn no_driver_available(registered: &[String]) -> Self {
        Self::NoDriverAvailable {
            registered: registered.join(", "),
        }
    }

    /// Create a connection error for a key.
    pub fn connection(connection_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            connection_key: connection_key.into(),
            message: message.into(),
        }
    }

    /// Create a query execution error for a key.
    pub fn query_execution(connection_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryExecution {
            connection_key: connection_key.into(),
            message: message.into(),
        }
    }

    /// Create a missing parameters error naming every absent field.
    pub fn missing_parameters(missing: Vec<String>) -> Self {
        Self::MissingParameters { missing }
    }

    /// Create an unknown tool error.
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the database.
    /// These have no connection side effects.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameters { .. }
                | Self::InvalidDateFormat
                | Self::UnknownTool { .. }
                | Self::InvalidParameter { .. }
        )
    }

    /// True if a retry on the next call may succeed after eviction.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Result alias used throughout the server.
pub type DbaResult<T> = Result<T, DbaError>;
