//! # Configuration
//!
//! The service reads one JSON document:
//!
//! ```json
//! {
//!     "dbConnString": "host=localhost user=content dbname=site",
//!     "certPath": "/etc/restgres/cert.pem",
//!     "keyPath": "/etc/restgres/key.pem"
//! }
//! ```
//!
//! `host`, `port`, `reconnectAttempts` and `reconnectBackoffMs` are
//! optional. The document is read once at startup and re-read only when
//! the store has to be reopened.

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::observability::{log_event_at, log_event_with_fields, Event, Severity};

/// Default location of the configuration document
pub const DEFAULT_CONFIG_PATH: &str = "/etc/restgres/restgres.json";

/// Service configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Store connection string (required)
    pub db_conn_string: String,

    /// PEM certificate chain (required when TLS is on)
    #[serde(default)]
    pub cert_path: String,

    /// PEM private key (required when TLS is on)
    #[serde(default)]
    pub key_path: String,

    /// Listen address (optional, default 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port (optional, default 8000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection attempts per recovery (optional, default 3)
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    /// Backoff before the second attempt, doubled after each failure
    /// (optional, default 200ms)
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_reconnect_attempts() -> u32 {
    3
}
fn default_reconnect_backoff_ms() -> u64 {
    200
}

impl ServiceConfig {
    /// A document with only the required keys set
    pub fn new(
        db_conn_string: impl Into<String>,
        cert_path: impl Into<String>,
        key_path: impl Into<String>,
    ) -> Self {
        Self {
            db_conn_string: db_conn_string.into(),
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            host: default_host(),
            port: default_port(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
        }
    }

    /// Read and parse a document without validating it
    pub fn read(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::parse(path, e))
    }

    /// Validate required keys
    ///
    /// Certificate and key paths are only required when `tls` is set.
    pub fn validate(&self, tls: bool) -> ConfigResult<()> {
        if self.db_conn_string.trim().is_empty() {
            return Err(ConfigError::Invalid("dbConnString must not be empty".into()));
        }

        if tls {
            if self.cert_path.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "certPath is required unless serving with --insecure".into(),
                ));
            }
            if self.key_path.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "keyPath is required unless serving with --insecure".into(),
                ));
            }
        }

        if self.reconnect_attempts == 0 {
            return Err(ConfigError::Invalid("reconnectAttempts must be > 0".into()));
        }

        Ok(())
    }

    /// Certificate and key paths, if both are set
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        if self.cert_path.is_empty() || self.key_path.is_empty() {
            return None;
        }
        Some((Path::new(&self.cert_path), Path::new(&self.key_path)))
    }

    /// Connection string with any password masked
    pub fn redacted_conn_string(&self) -> String {
        redact_password(&self.db_conn_string)
    }

    /// Write the document, creating parent directories
    pub fn write(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::write(path, e))?;
        }

        let mut body = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut body, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut serializer)
            .map_err(|e| ConfigError::write(path, e))?;
        body.push(b'\n');

        fs::write(path, body).map_err(|e| ConfigError::write(path, e))
    }
}

/// Mask the password of a key/value or URL connection string
fn redact_password(conn: &str) -> String {
    if let Some((scheme, rest)) = conn.split_once("://") {
        if let Some((userinfo, host)) = rest.split_once('@') {
            if let Some((user, _)) = userinfo.split_once(':') {
                return format!("{}://{}:****@{}", scheme, user, host);
            }
        }
        return conn.to_string();
    }

    conn.split_whitespace()
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key.eq_ignore_ascii_case("password") => format!("{}=****", key),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shared, reloadable configuration
///
/// Readers always get a cloned snapshot; a reload replaces the value
/// under the lock.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    tls: bool,
    current: Mutex<ServiceConfig>,
}

impl ConfigStore {
    /// Read and validate the document at `path`
    pub fn load(path: impl Into<PathBuf>, tls: bool) -> ConfigResult<Self> {
        let path = path.into();
        let config = ServiceConfig::read(&path)?;
        config.validate(tls)?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", &path.display().to_string())],
        );

        Ok(Self {
            path,
            tls,
            current: Mutex::new(config),
        })
    }

    /// Wrap an already validated document
    pub fn from_config(path: impl Into<PathBuf>, tls: bool, config: ServiceConfig) -> Self {
        Self {
            path: path.into(),
            tls,
            current: Mutex::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    pub fn snapshot(&self) -> ServiceConfig {
        self.lock().clone()
    }

    /// Re-read the document, replacing the cached value on success
    pub fn reload(&self) -> ConfigResult<ServiceConfig> {
        let config = ServiceConfig::read(&self.path)?;
        config.validate(self.tls)?;

        *self.lock() = config.clone();
        log_event_with_fields(
            Event::ConfigReloaded,
            &[("path", &self.path.display().to_string())],
        );
        Ok(config)
    }

    /// Fresh connection string for reopening the store
    ///
    /// Falls back to the cached value if the document can no longer be
    /// read or validated.
    pub fn connection_string(&self) -> String {
        match self.reload() {
            Ok(config) => config.db_conn_string,
            Err(e) => {
                log_event_at(
                    Severity::Warn,
                    Event::ConfigReloadFailed,
                    &[("reason", &e.to_string())],
                );
                self.lock().db_conn_string.clone()
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServiceConfig> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
