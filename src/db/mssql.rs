//! TDS driver backed by tiberius.
//!
//! Wraps a `tiberius::Client` behind the `SqlDriver`/`SqlConnection` traits.
//! Every batch goes through `simple_query`: callers supply finished SQL text,
//! so there is no parameter binding at this layer.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures_util::TryStreamExt;
use serde_json::Value as JsonValue;
use tiberius::{AuthMethod, Client, ColumnData, ColumnType, Config, EncryptionLevel, QueryItem};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::db::driver::{RowSet, SqlConnection, SqlDriver};
use crate::error::{DbaError, DbaResult};
use crate::models::connection::ConnectionConfig;
use crate::models::query::Row;

type TdsClient = Client<Compat<TcpStream>>;

/// The production SQL Server driver.
pub struct TdsDriver;

impl TdsDriver {
    pub const NAME: &'static str = "tiberius-tds";

    pub fn new() -> Self {
        Self
    }
}

impl Default for TdsDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SqlDriver for TdsDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn connect(&self, config: &ConnectionConfig) -> DbaResult<Box<dyn SqlConnection>> {
        let key = config.key().to_string();

        let mut tds_config = Config::new();
        tds_config.host(&config.server);
        tds_config.port(config.port);
        tds_config.database(&config.database);
        tds_config.authentication(AuthMethod::sql_server(&config.user, &config.password));
        tds_config.encryption(if config.encrypt {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::NotSupported
        });
        if config.trust_server_certificate {
            tds_config.trust_cert();
        }

        let tcp = TcpStream::connect(tds_config.get_addr())
            .await
            .map_err(|e| DbaError::connection(key.as_str(), e.to_string()))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(tds_config, tcp.compat_write())
            .await
            .map_err(|e| DbaError::connection(key.as_str(), e.to_string()))?;

        debug!(connection_key = %key, "TDS session established");
        Ok(Box::new(TdsConnection { key, client }))
    }
}

/// One live TDS session.
pub struct TdsConnection {
    key: String,
    client: TdsClient,
}

#[async_trait]
impl SqlConnection for TdsConnection {
    async fn ping(&mut self) -> DbaResult<()> {
        let stream = self
            .client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| DbaError::connection(self.key.as_str(), e.to_string()))?;
        stream
            .into_results()
            .await
            .map_err(|e| DbaError::connection(self.key.as_str(), e.to_string()))?;
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> DbaResult<RowSet> {
        let mut stream = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| DbaError::query_execution(self.key.as_str(), e.to_string()))?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Row> = Vec::new();
        let mut saw_rowset = false;

        while let Some(item) = stream
            .try_next()
            .await
            .map_err(|e| DbaError::query_execution(self.key.as_str(), e.to_string()))?
        {
            match item {
                QueryItem::Metadata(meta) => {
                    saw_rowset = true;
                    if columns.is_empty() {
                        columns = meta.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                }
                QueryItem::Row(row) => rows.push(convert_row(&row)),
            }
        }

        // The batch interface surfaces row data, not DONE counts. Report -1
        // for row-returning statements, as the classic drivers do, and
        // nothing otherwise.
        let rows_affected = saw_rowset.then_some(-1);

        Ok(RowSet {
            columns,
            rows,
            rows_affected,
        })
    }

    async fn close(self: Box<Self>) -> DbaResult<()> {
        let this = *self;
        this.client
            .close()
            .await
            .map_err(|e| DbaError::connection(this.key.as_str(), e.to_string()))
    }
}

/// Convert one row into an ordered column-to-value map.
///
/// Temporal columns go through the typed chrono getters so they serialize as
/// ISO-8601 strings; everything else converts straight from the wire value.
fn convert_row(row: &tiberius::Row) -> Row {
    let mut map = Row::new();
    for (idx, (col, data)) in row.cells().enumerate() {
        let value = match col.column_type() {
            ColumnType::Datetime
            | ColumnType::Datetime4
            | ColumnType::Datetimen
            | ColumnType::Datetime2 => row
                .try_get::<chrono::NaiveDateTime, _>(idx)
                .ok()
                .flatten()
                .map(|dt| JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
                .unwrap_or(JsonValue::Null),
            ColumnType::DatetimeOffsetn => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
                .ok()
                .flatten()
                .map(|dt| JsonValue::String(dt.to_rfc3339()))
                .unwrap_or(JsonValue::Null),
            ColumnType::Daten => row
                .try_get::<chrono::NaiveDate, _>(idx)
                .ok()
                .flatten()
                .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(JsonValue::Null),
            ColumnType::Timen => row
                .try_get::<chrono::NaiveTime, _>(idx)
                .ok()
                .flatten()
                .map(|t| JsonValue::String(t.format("%H:%M:%S%.f").to_string()))
                .unwrap_or(JsonValue::Null),
            _ => column_data_to_json(data),
        };
        map.insert(col.name().to_string(), value);
    }
    map
}

/// Convert a non-temporal wire value to JSON.
fn column_data_to_json(data: &ColumnData<'_>) -> JsonValue {
    match data {
        ColumnData::Bit(v) => v.map(JsonValue::Bool).unwrap_or(JsonValue::Null),
        ColumnData::U8(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        ColumnData::I16(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        ColumnData::I32(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        ColumnData::I64(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        ColumnData::F32(v) => v
            .and_then(|n| serde_json::Number::from_f64(f64::from(n)))
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ColumnData::F64(v) => v
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ColumnData::Numeric(v) => v
            .as_ref()
            .and_then(|n| {
                let scaled = n.value() as f64 / 10f64.powi(i32::from(n.scale()));
                serde_json::Number::from_f64(scaled)
            })
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ColumnData::String(v) => v
            .as_deref()
            .map(|s| JsonValue::String(s.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Guid(v) => v
            .as_ref()
            .map(|g| JsonValue::String(g.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Binary(v) => v
            .as_deref()
            .map(|b| JsonValue::String(STANDARD.encode(b)))
            .unwrap_or(JsonValue::Null),
        ColumnData::Xml(v) => v
            .as_deref()
            .map(|x| JsonValue::String(x.to_string()))
            .unwrap_or(JsonValue::Null),
        // Temporal variants are handled through the typed getters above.
        _ => JsonValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_name_is_in_preference_list() {
        assert!(crate::db::driver::DRIVER_PREFERENCE.contains(&TdsDriver::NAME));
        assert_eq!(TdsDriver::new().name(), TdsDriver::NAME);
    }

    #[test]
    fn test_convert_integers() {
        assert_eq!(
            column_data_to_json(&ColumnData::I32(Some(42))),
            serde_json::json!(42)
        );
        assert_eq!(
            column_data_to_json(&ColumnData::I64(Some(-7))),
            serde_json::json!(-7)
        );
        assert_eq!(column_data_to_json(&ColumnData::I32(None)), JsonValue::Null);
    }

    #[test]
    fn test_convert_bit_and_string() {
        assert_eq!(
            column_data_to_json(&ColumnData::Bit(Some(true))),
            serde_json::json!(true)
        );
        assert_eq!(
            column_data_to_json(&ColumnData::String(Some("hello".into()))),
            serde_json::json!("hello")
        );
        assert_eq!(
            column_data_to_json(&ColumnData::String(None)),
            JsonValue::Null
        );
    }

    #[test]
    fn test_convert_floats() {
        assert_eq!(
            column_data_to_json(&ColumnData::F64(Some(1.5))),
            serde_json::json!(1.5)
        );
        // NaN has no JSON representation
        assert_eq!(
            column_data_to_json(&ColumnData::F64(Some(f64::NAN))),
            JsonValue::Null
        );
    }

    #[test]
    fn test_convert_numeric_applies_scale() {
        let numeric = tiberius::numeric::Numeric::new_with_scale(12345, 2);
        let value = column_data_to_json(&ColumnData::Numeric(Some(numeric)));
        assert_eq!(value, serde_json::json!(123.45));
    }

    #[test]
    fn test_convert_binary_is_base64() {
        let value = column_data_to_json(&ColumnData::Binary(Some(vec![0xde, 0xad].into())));
        assert_eq!(value, serde_json::json!("3q0="));
    }
}
