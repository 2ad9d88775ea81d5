//! Shared mock SQL driver for integration tests.
//!
//! The mock implements the `SqlDriver`/`SqlConnection` pair with scripted
//! outcomes and atomic counters, so tests can assert exactly how many opens,
//! probes, queries, and closes the connection manager performed.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dba_mcp_server::db::{ConnectionManager, DriverRegistry, RowSet, SqlConnection, SqlDriver};
use dba_mcp_server::error::{DbaError, DbaResult};
use dba_mcp_server::models::ConnectionConfig;
use serde_json::Value as JsonValue;

/// Call counters shared between a driver and the test body.
#[derive(Debug, Default)]
pub struct DriverStats {
    pub connects: AtomicUsize,
    pub pings: AtomicUsize,
    pub queries: AtomicUsize,
    pub closes: AtomicUsize,
}

impl DriverStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Live behavior switches. Tests flip these mid-scenario.
#[derive(Debug, Default)]
pub struct MockBehavior {
    pub fail_connect: AtomicBool,
    pub fail_ping: AtomicBool,
    pub fail_query: AtomicBool,
}

impl MockBehavior {
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_ping(&self, fail: bool) {
        self.fail_ping.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_query(&self, fail: bool) {
        self.fail_query.store(fail, Ordering::SeqCst);
    }
}

/// Scripted driver: every successful query returns a clone of one row set.
pub struct MockDriver {
    name: String,
    stats: Arc<DriverStats>,
    behavior: Arc<MockBehavior>,
    row_set: RowSet,
    captured_sql: Arc<Mutex<Vec<String>>>,
    connect_delay: Option<Duration>,
}

impl MockDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stats: Arc::new(DriverStats::default()),
            behavior: Arc::new(MockBehavior::default()),
            row_set: sample_rows(),
            captured_sql: Arc::new(Mutex::new(Vec::new())),
            connect_delay: None,
        }
    }

    pub fn with_row_set(mut self, row_set: RowSet) -> Self {
        self.row_set = row_set;
        self
    }

    /// Widen the race window on connection opens.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub fn stats(&self) -> Arc<DriverStats> {
        Arc::clone(&self.stats)
    }

    pub fn behavior(&self) -> Arc<MockBehavior> {
        Arc::clone(&self.behavior)
    }

    pub fn captured_sql(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.captured_sql)
    }
}

#[async_trait]
impl SqlDriver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, _config: &ConnectionConfig) -> DbaResult<Box<dyn SqlConnection>> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_connect.load(Ordering::SeqCst) {
            return Err(DbaError::connection("mock", "connection refused"));
        }
        Ok(Box::new(MockConnection {
            stats: Arc::clone(&self.stats),
            behavior: Arc::clone(&self.behavior),
            row_set: self.row_set.clone(),
            captured_sql: Arc::clone(&self.captured_sql),
        }))
    }
}

pub struct MockConnection {
    stats: Arc<DriverStats>,
    behavior: Arc<MockBehavior>,
    row_set: RowSet,
    captured_sql: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SqlConnection for MockConnection {
    async fn ping(&mut self) -> DbaResult<()> {
        self.stats.pings.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_ping.load(Ordering::SeqCst) {
            return Err(DbaError::connection("mock", "liveness probe failed"));
        }
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> DbaResult<RowSet> {
        self.stats.queries.fetch_add(1, Ordering::SeqCst);
        self.captured_sql.lock().unwrap().push(sql.to_string());
        if self.behavior.fail_query.load(Ordering::SeqCst) {
            return Err(DbaError::query_execution("mock", "simulated query failure"));
        }
        Ok(self.row_set.clone())
    }

    async fn close(self: Box<Self>) -> DbaResult<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Everything a test needs: the manager plus handles into its mock driver.
pub struct MockHarness {
    pub manager: Arc<ConnectionManager>,
    pub stats: Arc<DriverStats>,
    pub behavior: Arc<MockBehavior>,
    pub captured_sql: Arc<Mutex<Vec<String>>>,
}

impl MockHarness {
    pub fn last_sql(&self) -> String {
        self.captured_sql
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no SQL captured")
    }
}

pub fn harness() -> MockHarness {
    harness_with(MockDriver::new("mock-sql"))
}

pub fn harness_with(driver: MockDriver) -> MockHarness {
    let stats = driver.stats();
    let behavior = driver.behavior();
    let captured_sql = driver.captured_sql();

    let mut registry = DriverRegistry::new([driver.name().to_string()]);
    registry.register(Arc::new(driver));

    MockHarness {
        manager: Arc::new(ConnectionManager::new(registry)),
        stats,
        behavior,
        captured_sql,
    }
}

/// Default scripted result: one two-column row, `rowsAffected` = -1.
pub fn sample_rows() -> RowSet {
    let mut row = serde_json::Map::new();
    row.insert("id".to_string(), JsonValue::from(1));
    row.insert("name".to_string(), JsonValue::from("Widget"));

    RowSet {
        columns: vec!["id".to_string(), "name".to_string()],
        rows: vec![row],
        rows_affected: Some(-1),
    }
}

/// Row set shaped like a mutation: no columns, positive affected count.
pub fn mutation_rows(affected: i64) -> RowSet {
    RowSet {
        columns: Vec::new(),
        rows: Vec::new(),
        rows_affected: Some(affected),
    }
}

pub fn sample_config() -> ConnectionConfig {
    ConnectionConfig::new("db.example.com", "Sales", "reader", "s3cret")
}
