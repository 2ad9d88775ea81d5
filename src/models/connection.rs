//! Connection-related data models.
//!
//! This module defines the per-request connection configuration and the
//! derived cache key used by the connection manager.

use serde::{Deserialize, Serialize};

/// Default SQL Server port.
pub const DEFAULT_SQL_PORT: u16 = 1433;

fn default_port() -> u16 {
    DEFAULT_SQL_PORT
}

fn default_encrypt() -> bool {
    true
}

/// Configuration for one database target, supplied by the caller on every
/// tool invocation.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Hostname or address of the SQL Server instance.
    pub server: String,
    pub database: String,
    pub user: String,
    /// Contains sensitive data - never logged, never echoed in results.
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_encrypt")]
    pub encrypt: bool,
    #[serde(default, rename = "trustServerCertificate")]
    pub trust_server_certificate: bool,
}

impl ConnectionConfig {
    /// Create a configuration with default port and TLS flags.
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
            port: DEFAULT_SQL_PORT,
            encrypt: true,
            trust_server_certificate: false,
        }
    }

    /// Derive the cache key for this configuration.
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey::new(&self.server, &self.database, &self.user, self.port)
    }

    /// Non-secret fields echoed back in query results.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            server: self.server.clone(),
            database: self.database.clone(),
            user: self.user.clone(),
            port: self.port,
        }
    }
}

// Manual Debug so the password can never leak through logging.
impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"****")
            .field("port", &self.port)
            .field("encrypt", &self.encrypt)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .finish()
    }
}

/// Identity of a database target, used to index the connection cache.
///
/// Derived from (server, database, user, port) only. Password and TLS flags
/// are deliberately excluded, so a password change does not invalidate a
/// cached entry - a documented limitation of the cache, not a feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    server: String,
    database: String,
    user: String,
    port: u16,
}

impl ConnectionKey {
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            user: user.into(),
            port,
        }
    }
}

impl std::fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.server, self.database, self.user, self.port
        )
    }
}

/// Non-secret connection fields echoed back in every successful result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub server: String,
    pub database: String,
    pub user: String,
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ConnectionConfig {
        ConnectionConfig::new("db.example.com", "Sales", "reader", "s3cret")
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = sample_config().key();
        let b = sample_config().key();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "db.example.com_Sales_reader_1433");
    }

    #[test]
    fn test_key_ignores_password_and_tls_flags() {
        let mut other = sample_config();
        other.password = "different".to_string();
        other.encrypt = false;
        other.trust_server_certificate = true;
        assert_eq!(sample_config().key(), other.key());
    }

    #[test]
    fn test_key_changes_with_port() {
        let mut other = sample_config();
        other.port = 1434;
        assert_ne!(sample_config().key(), other.key());
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", sample_config());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("****"));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: ConnectionConfig = serde_json::from_value(serde_json::json!({
            "server": "localhost",
            "database": "master",
            "user": "sa",
            "password": "pw"
        }))
        .unwrap();
        assert_eq!(config.port, DEFAULT_SQL_PORT);
        assert!(config.encrypt);
        assert!(!config.trust_server_certificate);
    }

    #[test]
    fn test_serialize_skips_password() {
        let value = serde_json::to_value(sample_config()).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["server"], "db.example.com");
    }

    #[test]
    fn test_info_excludes_password() {
        let info = sample_config().info();
        assert_eq!(info.server, "db.example.com");
        assert_eq!(info.port, 1433);
        let value = serde_json::to_value(info).unwrap();
        assert!(value.get("password").is_none());
    }
}
