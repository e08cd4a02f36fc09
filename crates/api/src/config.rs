//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use checkout::CommitMode;

use crate::sessions::{DEFAULT_SESSION_CAPACITY, DEFAULT_SESSION_IDLE};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other:?}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs in memory
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `COMMIT_MODE`: `sequential`, `idempotent` or `atomic` (default: `sequential`)
/// - `SESSION_DIR`: directory for persisted session carts; unset keeps them in memory
/// - `SESSION_CAPACITY`: carts kept in memory before the least recently used is evicted (default: `10000`)
/// - `SESSION_IDLE_SECS`: idle seconds before a cart is evicted (default: `1800`)
///
/// Unparseable values fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub commit_mode: CommitMode,
    pub session_dir: Option<PathBuf>,
    pub session_capacity: usize,
    pub session_idle: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|f| f.parse().ok())
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            commit_mode: lookup("COMMIT_MODE")
                .and_then(|m| m.parse().ok())
                .unwrap_or(defaults.commit_mode),
            session_dir: lookup("SESSION_DIR")
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from),
            session_capacity: lookup("SESSION_CAPACITY")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.session_capacity),
            session_idle: lookup("SESSION_IDLE_SECS")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_idle),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 5,
            commit_mode: CommitMode::Sequential,
            session_dir: None,
            session_capacity: DEFAULT_SESSION_CAPACITY,
            session_idle: DEFAULT_SESSION_IDLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.commit_mode, CommitMode::Sequential);
    }

    #[test]
    fn test_reads_variables() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("COMMIT_MODE", "idempotent"),
            ("SESSION_DIR", "/tmp/sessions"),
            ("SESSION_CAPACITY", "250"),
            ("SESSION_IDLE_SECS", "90"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/shop"));
        assert_eq!(config.database_max_connections, 12);
        assert_eq!(config.commit_mode, CommitMode::Idempotent);
        assert_eq!(config.session_dir, Some(PathBuf::from("/tmp/sessions")));
        assert_eq!(config.session_capacity, 250);
        assert_eq!(config.session_idle, Duration::from_secs(90));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("COMMIT_MODE", "yolo"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
            ("DATABASE_URL", "  "),
            ("SESSION_CAPACITY", "0"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.commit_mode, CommitMode::Sequential);
        assert_eq!(config.database_max_connections, 5);
        assert!(config.database_url.is_none());
        assert_eq!(config.session_capacity, DEFAULT_SESSION_CAPACITY);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
