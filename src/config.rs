//! Gateway configuration
//!
//! Loaded from a YAML file; every field has a default so an empty file, or
//! no file at all, yields a working local setup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for [`GatewayConfig`]
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Shape of the `GRAPH.QUERY` reply the server sends back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `[header, [row, ...], stats]`
    #[default]
    FalkorDb,
    /// `[header, row, row, ...]`
    Samyama,
}

/// Connection settings for the RESP graph gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Graph name passed to `GRAPH.QUERY`
    pub graph: String,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Socket read timeout in milliseconds (0 disables)
    pub read_timeout_ms: u64,
    /// Reply layout
    pub dialect: Dialect,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            graph: "negotiation_continuity".to_string(),
            connect_timeout_ms: 2_000,
            read_timeout_ms: 30_000,
            dialect: Dialect::FalkorDb,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Loaded gateway config from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// `host:port` address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        if self.read_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.read_timeout_ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.address(), "127.0.0.1:6379");
        assert_eq!(config.graph, "negotiation_continuity");
        assert_eq!(config.dialect, Dialect::FalkorDb);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = GatewayConfig::from_yaml("port: 7000\ndialect: samyama\n").unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.dialect, Dialect::Samyama);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = GatewayConfig::from_yaml("   \n").unwrap();
        assert_eq!(config.port, 6379);
    }

    #[test]
    fn test_read_timeout_zero_disables() {
        let config = GatewayConfig {
            read_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.read_timeout().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host: graph.internal\ngraph: demo").unwrap();
        let config = GatewayConfig::load(file.path()).unwrap();
        assert_eq!(config.host, "graph.internal");
        assert_eq!(config.graph, "demo");
    }

    #[test]
    fn test_load_rejects_bad_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port: not-a-number").unwrap();
        assert!(matches!(
            GatewayConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            GatewayConfig::load("/nonexistent/negotiation.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
