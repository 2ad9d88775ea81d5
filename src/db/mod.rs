//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Driver registry with preference-ordered selection
//! - The tiberius-backed TDS driver
//! - Connection cache with per-key serialization and eviction

pub mod driver;
pub mod manager;
pub mod mssql;

pub use driver::{DRIVER_PREFERENCE, DriverRegistry, RowSet, SqlConnection, SqlDriver};
pub use manager::ConnectionManager;
pub use mssql::TdsDriver;
