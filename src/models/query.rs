//! Query result models.
//!
//! `QueryResult` is the single result shape both transports serialize: success
//! payloads carry the recordset and connection echo, failure payloads carry
//! exactly `{success, error, queryExecutedAt}`. Optional fields are omitted
//! from the wire when unset so both shapes fall out of one struct.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::connection::ConnectionInfo;

/// One result row: column name to JSON value, in driver column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// Result of executing a tool, in wire form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub success: bool,

    /// Driver-reported mutation count. -1 for row-returning statements,
    /// absent when the driver reports nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<i64>,

    /// All rows, materialized eagerly. Length always equals the driver's
    /// row count, independent of `rows_affected`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recordset: Option<Vec<Row>>,

    /// Column names in driver order. Empty for statements without a row-set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    /// ISO-8601 timestamp taken when the result was produced.
    pub query_executed_at: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_info: Option<ConnectionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_metadata: Option<ReportMetadata>,
}

impl QueryResult {
    /// Build a success result, stamping the execution timestamp.
    pub fn success(
        recordset: Vec<Row>,
        columns: Vec<String>,
        rows_affected: Option<i64>,
        connection_info: ConnectionInfo,
    ) -> Self {
        Self {
            success: true,
            rows_affected,
            recordset: Some(recordset),
            columns: Some(columns),
            query_executed_at: now_iso8601(),
            connection_info: Some(connection_info),
            error: None,
            report_metadata: None,
        }
    }

    /// Build the in-band failure payload: `{success:false, error, queryExecutedAt}`.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            rows_affected: None,
            recordset: None,
            columns: None,
            query_executed_at: now_iso8601(),
            connection_info: None,
            error: Some(error.into()),
            report_metadata: None,
        }
    }

    /// Attach report metadata (performance-report tool only).
    pub fn with_report_metadata(mut self, metadata: ReportMetadata) -> Self {
        self.report_metadata = Some(metadata);
        self
    }

    /// Number of rows in the recordset.
    pub fn row_count(&self) -> usize {
        self.recordset.as_ref().map_or(0, Vec::len)
    }
}

/// Metadata attached to successful performance-report executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub from_date: String,
    pub to_date: String,
    pub product_count: usize,
    pub products: Vec<String>,
    pub procedure_name: String,
}

/// Current time as an ISO-8601 string.
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}
