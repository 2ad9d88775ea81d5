//! Tool invocation validation and dispatch.
//!
//! Every transport funnels tool calls through [`Dispatcher::dispatch`], so
//! argument checking and error shaping behave identically over stdio and HTTP.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::db::ConnectionManager;
use crate::error::{DbaError, DbaResult};
use crate::models::{ConnectionConfig, QueryResult, ReportMetadata};
use crate::tools::ToolKind;
use crate::tools::report::{self, DEFAULT_PROCEDURE_NAME};

/// A transport-agnostic tool call: wire name plus raw JSON arguments.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: serde_json::Map<String, JsonValue>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: serde_json::Map<String, JsonValue>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Validates tool calls and routes them into the connection manager.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    manager: Arc<ConnectionManager>,
}

impl Dispatcher {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    /// Connection manager behind this dispatcher.
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Validate and execute one tool call.
    ///
    /// All missing required fields are reported in a single error, in schema
    /// order, before any argument is deserialized.
    pub async fn dispatch(&self, invocation: &ToolInvocation) -> DbaResult<QueryResult> {
        let kind = ToolKind::from_name(&invocation.name)
            .ok_or_else(|| DbaError::unknown_tool(&invocation.name))?;

        let missing: Vec<String> = kind
            .required_fields()
            .iter()
            .filter(|field| !argument_present(&invocation.arguments, field))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DbaError::missing_parameters(missing));
        }

        debug!(tool = invocation.name.as_str(), "dispatching tool call");

        let config = connection_config(&invocation.arguments)?;
        match kind {
            ToolKind::AskDba => {
                let query = string_argument(&invocation.arguments, "query")?;
                // The tool's contract is verbatim passthrough of the batch text.
                self.manager.execute(&config, &query).await
            }
            ToolKind::GeneratePerformanceReport => {
                self.run_performance_report(&config, &invocation.arguments).await
            }
        }
    }

    async fn run_performance_report(
        &self,
        config: &ConnectionConfig,
        arguments: &serde_json::Map<String, JsonValue>,
    ) -> DbaResult<QueryResult> {
        let from_raw = string_argument(arguments, "from_date")?;
        let to_raw = string_argument(arguments, "to_date")?;
        let from_date = report::parse_report_date(&from_raw)?;
        let to_date = report::parse_report_date(&to_raw)?;
        let products = string_list_argument(arguments, "product_list")?;
        let procedure_name = optional_string_argument(arguments, "procedure_name")?
            .unwrap_or_else(|| DEFAULT_PROCEDURE_NAME.to_string());

        let sql = report::build_report_sql(&procedure_name, from_date, to_date, &products);
        let result = self.manager.execute(config, &sql).await?;

        Ok(result.with_report_metadata(ReportMetadata {
            from_date: from_raw,
            to_date: to_raw,
            product_count: products.len(),
            products,
            procedure_name,
        }))
    }
}

/// A required field counts as present only when it is set and non-null.
fn argument_present(arguments: &serde_json::Map<String, JsonValue>, field: &str) -> bool {
    matches!(arguments.get(field), Some(value) if !value.is_null())
}

fn connection_config(arguments: &serde_json::Map<String, JsonValue>) -> DbaResult<ConnectionConfig> {
    serde_json::from_value(JsonValue::Object(arguments.clone()))
        .map_err(|e| DbaError::invalid_parameter("connection", e.to_string()))
}

fn string_argument(
    arguments: &serde_json::Map<String, JsonValue>,
    name: &str,
) -> DbaResult<String> {
    arguments
        .get(name)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| DbaError::invalid_parameter(name, "must be a string"))
}

fn optional_string_argument(
    arguments: &serde_json::Map<String, JsonValue>,
    name: &str,
) -> DbaResult<Option<String>> {
    match arguments.get(name) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(DbaError::invalid_parameter(name, "must be a string")),
    }
}

fn string_list_argument(
    arguments: &serde_json::Map<String, JsonValue>,
    name: &str,
) -> DbaResult<Vec<String>> {
    let items = arguments
        .get(name)
        .and_then(JsonValue::as_array)
        .ok_or_else(|| DbaError::invalid_parameter(name, "must be an array of strings"))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| DbaError::invalid_parameter(name, "must be an array of strings"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DriverRegistry;
    use serde_json::json;

    fn driverless_dispatcher() -> Dispatcher {
        let registry = DriverRegistry::new(Vec::<String>::new());
        Dispatcher::new(Arc::new(ConnectionManager::new(registry)))
    }

    fn arguments(value: JsonValue) -> serde_json::Map<String, JsonValue> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_dispatch_rejects_unknown_tool() {
        let dispatcher = driverless_dispatcher();
        let invocation = ToolInvocation::new("drop_database", serde_json::Map::new());

        let error = dispatcher.dispatch(&invocation).await.unwrap_err();
        assert!(matches!(error, DbaError::UnknownTool { ref name } if name == "drop_database"));
    }

    #[tokio::test]
    async fn test_dispatch_reports_all_missing_fields_in_schema_order() {
        let dispatcher = driverless_dispatcher();
        let invocation = ToolInvocation::new(
            "ask_dba",
            arguments(json!({ "database": "master", "password": "s3cret" })),
        );

        let error = dispatcher.dispatch(&invocation).await.unwrap_err();
        match error {
            DbaError::MissingParameters { missing } => {
                assert_eq!(missing, vec!["server", "user", "query"]);
            }
            other => panic!("expected MissingParameters, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_treats_null_as_missing() {
        let dispatcher = driverless_dispatcher();
        let invocation = ToolInvocation::new(
            "ask_dba",
            arguments(json!({
                "server": "db.example.com",
                "database": "master",
                "user": "sa",
                "password": "s3cret",
                "query": null
            })),
        );

        let error = dispatcher.dispatch(&invocation).await.unwrap_err();
        assert!(matches!(error, DbaError::MissingParameters { ref missing } if missing == &["query"]));
    }

    #[tokio::test]
    async fn test_dispatch_validates_dates_before_touching_drivers() {
        let dispatcher = driverless_dispatcher();
        let invocation = ToolInvocation::new(
            "generate_performance_report",
            arguments(json!({
                "server": "db.example.com",
                "database": "sales",
                "user": "report",
                "password": "s3cret",
                "from_date": "01/01/2024",
                "to_date": "2024-03-31",
                "product_list": ["Widget"]
            })),
        );

        let error = dispatcher.dispatch(&invocation).await.unwrap_err();
        assert!(matches!(error, DbaError::InvalidDateFormat));
    }

    #[tokio::test]
    async fn test_dispatch_surfaces_no_driver_error() {
        let dispatcher = driverless_dispatcher();
        let invocation = ToolInvocation::new(
            "ask_dba",
            arguments(json!({
                "server": "db.example.com",
                "database": "master",
                "user": "sa",
                "password": "s3cret",
                "query": "SELECT 1"
            })),
        );

        let error = dispatcher.dispatch(&invocation).await.unwrap_err();
        assert!(matches!(error, DbaError::NoDriverAvailable { .. }));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_non_string_product_entries() {
        let dispatcher = driverless_dispatcher();
        let invocation = ToolInvocation::new(
            "generate_performance_report",
            arguments(json!({
                "server": "db.example.com",
                "database": "sales",
                "user": "report",
                "password": "s3cret",
                "from_date": "2024-01-01",
                "to_date": "2024-03-31",
                "product_list": ["Widget", 7]
            })),
        );

        let error = dispatcher.dispatch(&invocation).await.unwrap_err();
        assert!(
            matches!(error, DbaError::InvalidParameter { ref parameter, .. } if parameter == "product_list")
        );
    }
}
