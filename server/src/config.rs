//! Configuration loaded from environment variables.
//!
//! Unparseable values fall back to their defaults. Only two problems are
//! fatal: an unknown `STORAGE_BACKEND` and a postgres backend without
//! `DATABASE_URL`.

use serde::Serialize;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Fatal configuration problems.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `STORAGE_BACKEND` is neither `memory` nor `postgres`.
    #[error("unknown STORAGE_BACKEND '{0}' (expected 'memory' or 'postgres')")]
    UnknownBackend(String),

    /// The postgres backend was selected without a connection string.
    #[error("STORAGE_BACKEND=postgres requires DATABASE_URL")]
    MissingDatabaseUrl,

    /// Host and port do not form a socket address.
    #[error("invalid listen address {0}")]
    InvalidAddress(String),
}

/// Where trips and bookings live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StorageBackend {
    /// Single-process in-memory store
    Memory,
    /// `PostgreSQL`
    Postgres(PostgresConfig),
}

/// `PostgreSQL` configuration
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct PostgresConfig {
    /// Connection URL, never logged
    #[serde(skip_serializing)]
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Metrics exporter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder
    pub enabled: bool,
    /// Scrape endpoint address
    pub addr: SocketAddr,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// HTTP listen address
    pub addr: SocketAddr,
    /// Storage backend
    pub storage: StorageBackend,
    /// Metrics exporter
    pub metrics: MetricsConfig,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
    /// Log output format
    pub log_format: LogFormat,
    /// Fleet records to preload
    pub fleet_seed_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a variable.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        fn parse_with<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|s| s.trim().parse().ok())
        }
        let parsed_lookup = &lookup;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_with(parsed_lookup, "PORT").unwrap_or(8080);
        let metrics_host = lookup("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let metrics_port: u16 = parse_with(parsed_lookup, "METRICS_PORT").unwrap_or(9090);

        let storage = match lookup("STORAGE_BACKEND")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("" | "memory") => StorageBackend::Memory,
            Some("postgres") => StorageBackend::Postgres(PostgresConfig {
                url: lookup("DATABASE_URL")
                    .filter(|url| !url.trim().is_empty())
                    .ok_or(ConfigError::MissingDatabaseUrl)?,
                max_connections: parse_with(parsed_lookup, "DATABASE_MAX_CONNECTIONS").unwrap_or(10),
                connect_timeout: parse_with(parsed_lookup, "DATABASE_CONNECT_TIMEOUT").unwrap_or(30),
            }),
            Some(other) => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        Ok(Self {
            addr: socket_addr(&host, port)?,
            storage,
            metrics: MetricsConfig {
                enabled: parse_with(parsed_lookup, "METRICS_ENABLED").unwrap_or(true),
                addr: socket_addr(&metrics_host, metrics_port)?,
            },
            shutdown_timeout: parse_with(parsed_lookup, "SHUTDOWN_TIMEOUT").unwrap_or(30),
            log_format: parse_with(parsed_lookup, "LOG_FORMAT").unwrap_or_default(),
            fleet_seed_path: lookup("FLEET_SEED_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// [`Self::shutdown_timeout`] as a duration.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    format!("{host}:{port}")
        .parse()
        .map_err(|_| ConfigError::InvalidAddress(format!("{host}:{port}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.storage, StorageBackend::Memory);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.addr, "0.0.0.0:9090".parse().unwrap());
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.fleet_seed_path, None);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = load(&[
            ("PORT", "eighty"),
            ("METRICS_ENABLED", "maybe"),
            ("SHUTDOWN_TIMEOUT", "-4"),
            ("LOG_FORMAT", "xml"),
        ])
        .unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert!(config.metrics.enabled);
        assert_eq!(config.shutdown_timeout, 30);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn postgres_backend() {
        let config = load(&[
            ("STORAGE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://localhost/coachline"),
            ("DATABASE_MAX_CONNECTIONS", "25"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        let StorageBackend::Postgres(pg) = config.storage else {
            panic!("expected postgres backend");
        };
        assert_eq!(pg.max_connections, 25);
        assert_eq!(pg.connect_timeout, 30);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn fatal_errors() {
        assert_eq!(
            load(&[("STORAGE_BACKEND", "postgres")]),
            Err(ConfigError::MissingDatabaseUrl)
        );
        assert_eq!(
            load(&[("STORAGE_BACKEND", "sqlite")]),
            Err(ConfigError::UnknownBackend("sqlite".to_string()))
        );
    }

    #[test]
    fn database_url_is_not_serialized() {
        let config = load(&[
            ("STORAGE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://user:secret@db/coachline"),
        ])
        .unwrap();
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("\"kind\":\"postgres\""));
    }
}
