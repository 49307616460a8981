//! Fragments configuration management

use crate::error::{Error, Result};
use crate::storage::FsBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main Fragments configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FragmentsConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Basic-auth user table
    #[serde(default)]
    pub auth: AuthConfig,
}

impl FragmentsConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used in `Location` headers (defaults to the request host)
    pub api_url: Option<String>,

    /// Allowed CORS origins (empty = any)
    pub cors_origins: Vec<String>,

    /// Maximum accepted request body in bytes
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_url: None,
            cors_origins: Vec::new(),
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Which storage backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Volatile, process-lifetime storage
    #[default]
    Memory,
    /// Durable filesystem storage under `data_dir`
    Fs,
}

impl std::str::FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "fs" => Ok(Self::Fs),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection
    pub backend: StorageBackendKind,

    /// Root directory for the `fs` backend
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Memory,
            data_dir: FsBackend::default_dir(),
        }
    }
}

/// One basic-auth user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub email: String,
    pub password: String,
}

/// Basic-auth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Realm reported in `WWW-Authenticate`
    pub realm: String,

    /// Users allowed to access the API
    pub users: Vec<UserCredentials>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: "fragments".to_string(),
            users: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FragmentsConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackendKind::Memory);
        assert!(config.auth.users.is_empty());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FragmentsConfig::from_toml(
            r#"
            [server]
            port = 9000

            [storage]
            backend = "fs"
            data_dir = "/var/lib/fragments"

            [[auth.users]]
            email = "user1@email.com"
            password = "password1"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.backend, StorageBackendKind::Fs);
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/fragments"));
        assert_eq!(config.auth.users.len(), 1);
        assert_eq!(config.auth.realm, "fragments");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = FragmentsConfig::default();
        let toml = config.to_toml().unwrap();
        let parsed = FragmentsConfig::from_toml(&toml).unwrap();
        assert_eq!(parsed.server.max_body_bytes, config.server.max_body_bytes);
    }

    #[test]
    fn test_invalid_backend() {
        let err = FragmentsConfig::from_toml("[storage]\nbackend = \"s3\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!("s3".parse::<StorageBackendKind>().is_err());
    }
}
