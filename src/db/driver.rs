//! SQL driver abstraction.
//!
//! The connection manager never talks to a concrete client library; it goes
//! through the `SqlDriver`/`SqlConnection` trait pair. Production registers
//! the TDS driver, tests register mock drivers. Driver selection walks a
//! fixed preference-ordered name list against whatever is registered,
//! failing with `NoDriverAvailable` when nothing matches.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{DbaError, DbaResult};
use crate::models::connection::ConnectionConfig;
use crate::models::query::Row;

/// Driver names tried in order when opening a connection.
pub const DRIVER_PREFERENCE: &[&str] = &["tiberius-tds"];

/// Everything a driver returns for one executed batch.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    /// Column names in driver order. Empty when the statement produced no row-set.
    pub columns: Vec<String>,
    /// All rows, materialized eagerly.
    pub rows: Vec<Row>,
    /// Driver-reported affected-row counter, if the driver surfaces one.
    pub rows_affected: Option<i64>,
}

/// A SQL Server client implementation that can open connections.
#[async_trait]
pub trait SqlDriver: Send + Sync {
    /// Stable name matched against the preference list.
    fn name(&self) -> &str;

    /// Open a new connection. Takes a full network round trip; callers must
    /// not hold map-wide locks across this.
    async fn connect(&self, config: &ConnectionConfig) -> DbaResult<Box<dyn SqlConnection>>;
}

/// One live database session, exclusively owned by its cache slot.
#[async_trait]
pub trait SqlConnection: Send {
    /// Cheap liveness probe (`SELECT 1`).
    async fn ping(&mut self) -> DbaResult<()>;

    /// Execute one SQL batch verbatim, materializing every row.
    async fn query(&mut self, sql: &str) -> DbaResult<RowSet>;

    /// Close the session. Failures are logged by the caller, never raised.
    async fn close(self: Box<Self>) -> DbaResult<()>;
}

/// Registered drivers plus the preference order used to pick one.
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn SqlDriver>>,
    preference: Vec<String>,
}

impl DriverRegistry {
    /// Create an empty registry with the given preference order.
    pub fn new<I, S>(preference: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            drivers: Vec::new(),
            preference: preference.into_iter().map(Into::into).collect(),
        }
    }

    /// The production registry: default preference list, TDS driver registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new(DRIVER_PREFERENCE.iter().copied());
        registry.register(Arc::new(crate::db::mssql::TdsDriver::new()));
        registry
    }

    /// Register a driver. Order is irrelevant; the preference list decides.
    pub fn register(&mut self, driver: Arc<dyn SqlDriver>) {
        self.drivers.push(driver);
    }

    /// Pick the most-preferred registered driver.
    pub fn select(&self) -> DbaResult<Arc<dyn SqlDriver>> {
        for preferred in &self.preference {
            if let Some(driver) = self.drivers.iter().find(|d| d.name() == preferred) {
                return Ok(Arc::clone(driver));
            }
        }
        Err(DbaError::no_driver_available(&self.driver_names()))
    }

    /// Names of all registered drivers, in registration order.
    pub fn driver_names(&self) -> Vec<String> {
        self.drivers.iter().map(|d| d.name().to_string()).collect()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.driver_names())
            .field("preference", &self.preference)
            .finish()
    }
}
