mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub use loader::load_config;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

/// Proxy server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Externally reachable base URL handed to playback targets
    /// (e.g., "http://homeassistant.local:8066"). Defaults to http://host:port.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl ServerConfig {
    /// Base URL used when building playback stream URLs, trailing slash stripped
    pub fn public_base_url(&self) -> String {
        match self.public_url {
            Some(ref url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

/// Connection settings for the upstream synthesis service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Total-operation budget per relay, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,
    /// TLS configuration options
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// TLS configuration for upstream connections
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Accept invalid certificates (self-signed, expired)
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Path to custom CA certificate (PEM format)
    pub ca_cert_path: Option<String>,
    /// Path to client certificate for mTLS
    pub client_cert_path: Option<String>,
    /// Path to client private key for mTLS
    pub client_key_path: Option<String>,
}

fn default_timeout() -> u64 {
    60
}

fn default_pool_max_idle() -> usize {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            pool_max_idle_per_host: default_pool_max_idle(),
            tls: None,
        }
    }
}

/// Stored synthesis settings, split into the outer "config" layer and the
/// inner "options" layer. Values are opaque: the request builder coerces them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SynthesisConfig {
    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub options: HashMap<String, serde_yaml::Value>,
}

impl SynthesisConfig {
    /// Set a value in the options layer (used for CLI overrides)
    pub fn set_option(&mut self, key: &str, value: impl Into<serde_yaml::Value>) {
        self.options.insert(key.to_string(), value.into());
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Load configuration with fallback to default path
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::from_file(path),
            None => {
                // Try default locations
                let default_paths = ["config.yaml", "config.yml", "./config/config.yaml"];
                for p in default_paths {
                    let path = Path::new(p);
                    if path.exists() {
                        return Self::from_file(path);
                    }
                }
                Err(ConfigError::NotFound(
                    "No config file found. Tried: config.yaml, config.yml, ./config/config.yaml"
                        .to_string(),
                ))
            }
        }
    }

    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".to_string()));
        }
        if self.upstream.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "upstream.timeout_seconds must be non-zero".to_string(),
            ));
        }
        if let Some(ref public_url) = self.server.public_url {
            match url::Url::parse(public_url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => {
                    return Err(ConfigError::Validation(format!(
                        "server.public_url must use http or https, got '{}'",
                        url.scheme()
                    )))
                }
                Err(e) => {
                    return Err(ConfigError::Validation(format!(
                        "server.public_url is not a valid URL: {}",
                        e
                    )))
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
