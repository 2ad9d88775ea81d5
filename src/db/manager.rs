//! Connection cache and lifecycle management.
//!
//! The manager owns at most one live connection per `ConnectionKey`. The
//! map-level lock only guards slot lookup and insertion; every driver round
//! trip (probe, open, query, close) happens under that key's slot mutex, so
//! concurrent first-use on a key opens exactly one connection while other
//! keys proceed untouched.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::db::driver::{DriverRegistry, SqlConnection};
use crate::error::DbaResult;
use crate::models::connection::{ConnectionConfig, ConnectionKey};
use crate::models::query::QueryResult;

/// One cache slot: zero or one live connection for its key.
#[derive(Default)]
struct Slot {
    connection: Option<Box<dyn SqlConnection>>,
}

/// Owner of the per-target connection cache.
pub struct ConnectionManager {
    registry: DriverRegistry,
    slots: RwLock<HashMap<ConnectionKey, Arc<Mutex<Slot>>>>,
}

impl ConnectionManager {
    /// Create a manager over the given driver registry.
    pub fn new(registry: DriverRegistry) -> Self {
        Self {
            registry,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Create a manager with the production driver registry.
    pub fn with_defaults() -> Self {
        Self::new(DriverRegistry::with_defaults())
    }

    /// Names of the registered drivers, for the health endpoint.
    pub fn driver_names(&self) -> Vec<String> {
        self.registry.driver_names()
    }

    /// Execute a SQL batch against the target described by `config`.
    ///
    /// Reuses the cached connection for the key when its liveness probe
    /// passes, opens a fresh one otherwise. A failed query poisons the
    /// connection: it is closed and the slot emptied, so the next call for
    /// the key starts from a clean open.
    pub async fn execute(&self, config: &ConnectionConfig, sql: &str) -> DbaResult<QueryResult> {
        let key = config.key();
        let slot = self.slot(&key).await;
        let mut guard = slot.lock().await;

        let mut conn = self.take_live(&mut guard, config, &key).await?;

        match conn.query(sql).await {
            Ok(row_set) => {
                guard.connection = Some(conn);
                let result = QueryResult::success(
                    row_set.rows,
                    row_set.columns,
                    row_set.rows_affected,
                    config.info(),
                );
                debug!(connection_key = %key, rows = result.row_count(), "Query complete");
                Ok(result)
            }
            Err(e) => {
                warn!(connection_key = %key, error = %e, "Query failed, evicting connection");
                if let Err(close_err) = conn.close().await {
                    debug!(connection_key = %key, error = %close_err, "Error closing evicted connection");
                }
                Err(e)
            }
        }
    }

    /// Best-effort close of every cached connection, then clear the cache.
    /// Failures are logged, never raised. Invoked once at shutdown.
    pub async fn close_all(&self) {
        let mut slots = self.slots.write().await;
        for (key, slot) in slots.drain() {
            let mut guard = slot.lock().await;
            if let Some(conn) = guard.connection.take() {
                info!(connection_key = %key, "Closing connection");
                if let Err(e) = conn.close().await {
                    warn!(connection_key = %key, error = %e, "Error closing connection");
                }
            }
        }
    }

    /// Number of live connections. Slots busy with a caller count as live.
    pub async fn connection_count(&self) -> usize {
        let slots = self.slots.read().await;
        slots
            .values()
            .filter(|slot| match slot.try_lock() {
                Ok(guard) => guard.connection.is_some(),
                Err(_) => true,
            })
            .count()
    }

    /// Get or create the slot for a key. Never holds the map lock across
    /// driver I/O.
    ///
    /// Eviction empties a slot but leaves the entry in place; only
    /// `close_all` removes entries. The map therefore grows with the number
    /// of distinct targets seen, and each key keeps a stable serialization
    /// point for the process lifetime.
    async fn slot(&self, key: &ConnectionKey) -> Arc<Mutex<Slot>> {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(key) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Take a live connection out of the locked slot, probing a cached one
    /// first and opening a fresh one when the cache is empty or stale.
    /// The slot stays locked (and empty) until the caller returns the
    /// connection or lets the eviction stand.
    async fn take_live(
        &self,
        slot: &mut Slot,
        config: &ConnectionConfig,
        key: &ConnectionKey,
    ) -> DbaResult<Box<dyn SqlConnection>> {
        if let Some(mut conn) = slot.connection.take() {
            match conn.ping().await {
                Ok(()) => {
                    debug!(connection_key = %key, "Reusing cached connection");
                    return Ok(conn);
                }
                Err(e) => {
                    warn!(connection_key = %key, error = %e, "Liveness probe failed, discarding cached connection");
                    if let Err(close_err) = conn.close().await {
                        debug!(connection_key = %key, error = %close_err, "Error closing stale connection");
                    }
                }
            }
        }

        let driver = self.registry.select()?;
        info!(connection_key = %key, driver = driver.name(), "Opening new connection");
        driver.connect(config).await
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_manager_has_no_connections() {
        let manager = ConnectionManager::with_defaults();
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_default_registry_exposes_tds_driver() {
        let manager = ConnectionManager::with_defaults();
        assert_eq!(
            manager.driver_names(),
            vec![crate::db::mssql::TdsDriver::NAME]
        );
    }

    #[tokio::test]
    async fn test_close_all_on_empty_cache_is_noop() {
        let manager = ConnectionManager::with_defaults();
        manager.close_all().await;
        assert_eq!(manager.connection_count().await, 0);
    }
}
