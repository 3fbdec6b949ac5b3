//! HTTP Server Configuration
//!
//! Listen address and optional TLS material for the server shell.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;

/// PEM certificate chain and private key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// TLS material; plain HTTP when absent
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: None,
        }
    }
}

impl HttpServerConfig {
    /// Create a new plain-HTTP config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Derive the listener settings from the service document
    ///
    /// `insecure` drops TLS even when paths are configured.
    pub fn from_service(config: &ServiceConfig, insecure: bool) -> Self {
        let tls = if insecure {
            None
        } else {
            config.tls_paths().map(|(cert, key)| TlsConfig {
                cert_path: cert.to_path_buf(),
                key_path: key.to_path_buf(),
            })
        };

        Self {
            host: config.host.clone(),
            port: config.port,
            tls,
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls.is_some() {
            "https"
        } else {
            "http"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let config = HttpServerConfig::with_port(8080);
        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
        assert_eq!(config.scheme(), "http");
    }

    #[test]
    fn test_from_service() {
        let mut service = ServiceConfig::new("host=db", "/etc/restgres/cert.pem", "/etc/restgres/key.pem");
        service.port = 8443;

        let secure = HttpServerConfig::from_service(&service, false);
        assert_eq!(secure.port, 8443);
        assert_eq!(secure.scheme(), "https");
        assert_eq!(
            secure.tls.unwrap().key_path,
            PathBuf::from("/etc/restgres/key.pem")
        );

        let insecure = HttpServerConfig::from_service(&service, true);
        assert!(insecure.tls.is_none());
    }
}
