//! Configuration for the CLI and the `librisd` server.
//!
//! Persisted as TOML at `$XDG_CONFIG_HOME/libris/config.toml`; every field
//! has a default suitable for local development (SQLite file in the working
//! directory, MinIO on localhost), and `LIBRIS_*` environment variables
//! override file values.

use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(libris::config::read),
        help("Ensure the config file exists and is readable, or remove it to use defaults.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {path}")]
    #[diagnostic(
        code(libris::config::parse),
        help("Check the TOML syntax. {message}")
    )]
    Parse { path: String, message: String },

    #[error("invalid value in environment variable {var}: {message}")]
    #[diagnostic(
        code(libris::config::env),
        help("Unset the variable or give it a value of the expected type.")
    )]
    Env { var: &'static str, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration, persisted as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the API server.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// TCP port for the API server.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// S3-compatible object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Endpoint URL (MinIO in development).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Region name sent to the endpoint.
    #[serde(default = "default_region")]
    pub region: String,
    /// Bucket holding book attachments.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_access_key")]
    pub access_key: String,
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    /// Validity of issued upload URLs, in seconds.
    #[serde(default = "default_url_expiry_secs")]
    pub url_expiry_secs: u64,
}

fn default_db_path() -> String {
    "library.db".into()
}
fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}
fn default_endpoint() -> String {
    "http://localhost:9000".into()
}
fn default_region() -> String {
    "sa-north-1".into()
}
fn default_bucket() -> String {
    "library-files".into()
}
fn default_access_key() -> String {
    "minioadmin".into()
}
fn default_secret_key() -> String {
    "minioadmin".into()
}
fn default_url_expiry_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            region: default_region(),
            bucket: default_bucket(),
            access_key: default_access_key(),
            secret_key: default_secret_key(),
            url_expiry_secs: default_url_expiry_secs(),
        }
    }
}

impl Config {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from a TOML file, falling back to defaults when the file is absent.
    ///
    /// `LIBRIS_*` environment variables are applied on top in both cases.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `LIBRIS_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(v) = std::env::var("LIBRIS_DB") {
            self.db_path = v;
        }
        if let Ok(v) = std::env::var("LIBRIS_BIND") {
            self.server.bind = v;
        }
        if let Ok(v) = std::env::var("LIBRIS_PORT") {
            self.server.port = v.parse().map_err(|_| ConfigError::Env {
                var: "LIBRIS_PORT",
                message: format!("\"{v}\" is not a valid port number"),
            })?;
        }
        if let Ok(v) = std::env::var("LIBRIS_S3_ENDPOINT") {
            self.storage.endpoint = v;
        }
        if let Ok(v) = std::env::var("LIBRIS_S3_REGION") {
            self.storage.region = v;
        }
        if let Ok(v) = std::env::var("LIBRIS_S3_BUCKET") {
            self.storage.bucket = v;
        }
        if let Ok(v) = std::env::var("LIBRIS_S3_ACCESS_KEY") {
            self.storage.access_key = v;
        }
        if let Ok(v) = std::env::var("LIBRIS_S3_SECRET_KEY") {
            self.storage.secret_key = v;
        }
        Ok(())
    }

    /// The `bind:port` address the server listens on.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    /// Absolute location of the database file.
    ///
    /// Relative `db_path` values resolve against the data directory so the
    /// CLI and the server agree on the database no matter where either was
    /// launched from.
    pub fn database_path(&self, data_dir: &Path) -> std::path::PathBuf {
        let raw = Path::new(&self.db_path);
        if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            data_dir.join(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_local_development() {
        let cfg = Config::default();
        assert_eq!(cfg.db_path, "library.db");
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.storage.bucket, "library-files");
        assert_eq!(cfg.storage.url_expiry_secs, 300);
        assert_eq!(cfg.listen_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            db_path = "/tmp/books.db"

            [server]
            port = 8080
            "#,
        )
        .unwrap();
        assert_eq!(cfg.db_path, "/tmp/books.db");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.storage.endpoint, "http://localhost:9000");
    }

    #[test]
    fn load_or_default_without_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = Config::load_or_default(&tmp.path().join("missing.toml")).unwrap();
        assert_eq!(cfg.server.port, 3000);
    }

    #[test]
    fn relative_db_path_resolves_under_data_dir() {
        let cfg = Config::default();
        let resolved = cfg.database_path(Path::new("/var/lib/libris"));
        assert_eq!(resolved, Path::new("/var/lib/libris/library.db"));

        let mut cfg = Config::default();
        cfg.db_path = "/tmp/books.db".into();
        assert_eq!(cfg.database_path(Path::new("/ignored")), Path::new("/tmp/books.db"));
    }

    #[test]
    fn load_rejects_bad_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "db_path = [not valid").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
