//! DBA tool catalog.
//!
//! Two fixed tools: `ask_dba` executes caller-supplied SQL verbatim, and
//! `generate_performance_report` templates a stored-procedure call from
//! validated report arguments. The catalog order is stable and wire-visible.

pub mod dispatcher;
pub mod report;

pub use dispatcher::{Dispatcher, ToolInvocation};
pub use report::DEFAULT_PROCEDURE_NAME;

use serde::Serialize;
use serde_json::{Value as JsonValue, json};

/// Closed set of tools this server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    AskDba,
    GeneratePerformanceReport,
}

impl ToolKind {
    /// Resolve a wire name. `None` becomes the unknown-tool error at the
    /// dispatch boundary.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ask_dba" => Some(Self::AskDba),
            "generate_performance_report" => Some(Self::GeneratePerformanceReport),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AskDba => "ask_dba",
            Self::GeneratePerformanceReport => "generate_performance_report",
        }
    }

    /// Required argument fields, in schema order.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::AskDba => &["server", "database", "user", "password", "query"],
            Self::GeneratePerformanceReport => &[
                "server",
                "database",
                "user",
                "password",
                "from_date",
                "to_date",
                "product_list",
            ],
        }
    }
}

/// One entry in the tool catalog.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonValue,
}

/// The tool catalog, in stable order: `ask_dba` first.
pub fn list_tools() -> Vec<ToolDefinition> {
    vec![ask_dba_definition(), performance_report_definition()]
}

fn connection_properties() -> JsonValue {
    json!({
        "server": {
            "type": "string",
            "description": "SQL Server hostname or IP address"
        },
        "database": {
            "type": "string",
            "description": "Database name"
        },
        "user": {
            "type": "string",
            "description": "Username for SQL Server authentication"
        },
        "password": {
            "type": "string",
            "description": "Password for SQL Server authentication"
        },
        "port": {
            "type": "integer",
            "description": "Port number (default: 1433)",
            "default": 1433
        },
        "encrypt": {
            "type": "boolean",
            "description": "Use an encrypted connection (default: true)",
            "default": true
        },
        "trustServerCertificate": {
            "type": "boolean",
            "description": "Trust the server certificate without validation (default: false)",
            "default": false
        }
    })
}

fn ask_dba_definition() -> ToolDefinition {
    let mut properties = connection_properties();
    properties["query"] = json!({
        "type": "string",
        "description": "SQL query to execute"
    });

    ToolDefinition {
        name: "ask_dba",
        description: "Execute an ad-hoc SQL query against a Microsoft SQL Server database",
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": ToolKind::AskDba.required_fields()
        }),
    }
}

fn performance_report_definition() -> ToolDefinition {
    let mut properties = connection_properties();
    properties["from_date"] = json!({
        "type": "string",
        "description": "Report start date in YYYY-MM-DD format"
    });
    properties["to_date"] = json!({
        "type": "string",
        "description": "Report end date in YYYY-MM-DD format"
    });
    properties["product_list"] = json!({
        "type": "array",
        "items": { "type": "string" },
        "description": "Product names to include in the report"
    });
    properties["procedure_name"] = json!({
        "type": "string",
        "description": "Stored procedure to call (default: sp_GeneratePerformanceReport)",
        "default": DEFAULT_PROCEDURE_NAME
    });

    ToolDefinition {
        name: "generate_performance_report",
        description: "Generate a product performance report over a date range via a stored procedure",
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": ToolKind::GeneratePerformanceReport.required_fields()
        }),
    }
}
