//! Configuration from the environment
//!
//! Every setting is read from environment variables (a `.env` file is
//! honoured) and validated before any listener is bound.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::endpoints::BackendName;
use crate::observability::LogConfig;

/// Shortest UI password accepted.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Port outside 1-65535
    #[error("invalid port for {field}: must be between 1 and 65535")]
    InvalidPort { field: String },

    /// Both listeners on one port
    #[error("core port and gateway port must differ, both are {port}")]
    PortClash { port: u16 },

    /// Invalid URL format
    #[error("invalid URL for {field}: {reason}")]
    InvalidUrl { field: String, reason: String },

    /// Missing required field
    #[error("missing required configuration: {0}")]
    MissingRequired(String),

    /// UI password too short
    #[error("UI_PASSWORD must be at least {min} characters")]
    WeakPassword { min: usize },

    /// Environment variable parse error
    #[error("failed to parse environment variable {name}: {reason}")]
    ParseError { name: String, reason: String },
}

/// Where one daemon lives and how the gateway talks to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    /// Which daemon
    pub name: BackendName,
    /// gRPC address
    pub rpc_url: Url,
    /// Macaroon the gateway presents on behalf of password-authorized callers
    pub macaroon_path: Option<PathBuf>,
    /// Certificate the daemon serves, trusted when connecting
    pub tls_cert_path: Option<PathBuf>,
}

/// Gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Bind address for both listeners
    pub host: String,
    /// Unified gRPC, gRPC-Web, REST and UI port
    pub gateway_port: u16,
    /// Port speaking the core daemon's native protocol
    pub core_port: u16,
    /// PEM certificate served on both ports
    pub tls_cert_path: PathBuf,
    /// PEM private key for the certificate
    pub tls_key_path: PathBuf,
    /// Shared UI password
    pub ui_password: String,
    /// Directory with the bundled UI
    pub ui_dir: Option<PathBuf>,
    /// Settings for lnd, faraday, loop and pool
    pub backends: Vec<BackendSettings>,
    /// Deadline for every outbound call
    pub backend_timeout: Duration,
    /// Graceful shutdown drain timeout
    pub shutdown_timeout: Duration,
    /// Plain-HTTP metrics listener
    pub metrics_addr: Option<SocketAddr>,
    /// Logging setup
    pub log: LogConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("gateway_port", &self.gateway_port)
            .field("core_port", &self.core_port)
            .field("tls_cert_path", &self.tls_cert_path)
            .field("tls_key_path", &self.tls_key_path)
            .field("ui_password", &"[REDACTED]")
            .field("ui_dir", &self.ui_dir)
            .field("backends", &self.backends)
            .field("backend_timeout", &self.backend_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("metrics_addr", &self.metrics_addr)
            .field("log", &self.log)
            .finish()
    }
}

impl Config {
    /// Loads configuration from environment variables with validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let backends = [
            (BackendName::Lnd, "https://localhost:10010"),
            (BackendName::Faraday, "https://localhost:8465"),
            (BackendName::Loop, "https://localhost:11010"),
            (BackendName::Pool, "https://localhost:12010"),
        ]
        .into_iter()
        .map(|(name, default_url)| backend_from_env(name, default_url))
        .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            host: env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            gateway_port: parse_env("GATEWAY_PORT", 8443)?,
            core_port: parse_env("CORE_PORT", 10009)?,
            tls_cert_path: parse_path_env("TLS_CERT_PATH")
                .ok_or_else(|| ConfigError::MissingRequired("TLS_CERT_PATH".to_string()))?,
            tls_key_path: parse_path_env("TLS_KEY_PATH")
                .ok_or_else(|| ConfigError::MissingRequired("TLS_KEY_PATH".to_string()))?,
            ui_password: env::var("UI_PASSWORD")
                .map_err(|_| ConfigError::MissingRequired("UI_PASSWORD".to_string()))?,
            ui_dir: parse_path_env("UI_DIR"),
            backends,
            backend_timeout: Duration::from_secs(parse_env("BACKEND_TIMEOUT_SECS", 10)?),
            shutdown_timeout: Duration::from_secs(parse_env("SHUTDOWN_TIMEOUT", 30)?),
            metrics_addr: parse_optional_env("METRICS_ADDR")?,
            log: LogConfig {
                level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                json: parse_env("LOG_JSON", false)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, port) in [
            ("GATEWAY_PORT", self.gateway_port),
            ("CORE_PORT", self.core_port),
        ] {
            if port == 0 {
                return Err(ConfigError::InvalidPort {
                    field: field.to_string(),
                });
            }
        }
        if self.gateway_port == self.core_port {
            return Err(ConfigError::PortClash {
                port: self.core_port,
            });
        }
        if self.ui_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ConfigError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }
        if self.backend_timeout.is_zero() {
            return Err(ConfigError::ParseError {
                name: "BACKEND_TIMEOUT_SECS".to_string(),
                reason: "timeout must be greater than 0".to_string(),
            });
        }
        if !self.backends.iter().any(|b| b.name == BackendName::Lnd) {
            return Err(ConfigError::MissingRequired("LND_RPC_URL".to_string()));
        }
        Ok(())
    }

    /// Settings for `name`, if configured.
    #[must_use]
    pub fn backend(&self, name: BackendName) -> Option<&BackendSettings> {
        self.backends.iter().find(|b| b.name == name)
    }

    /// Address of the gateway listener.
    pub fn gateway_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.host, self.gateway_port, "GATEWAY_HOST")
    }

    /// Address of the core listener.
    pub fn core_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.host, self.core_port, "GATEWAY_HOST")
    }
}

fn socket_addr(host: &str, port: u16, field: &str) -> Result<SocketAddr, ConfigError> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e: std::net::AddrParseError| ConfigError::ParseError {
            name: field.to_string(),
            reason: e.to_string(),
        })
}

/// Settings for one daemon from `<NAME>_*` variables.
fn backend_from_env(name: BackendName, default_url: &str) -> Result<BackendSettings, ConfigError> {
    let prefix = name.as_str().to_ascii_uppercase();
    Ok(BackendSettings {
        name,
        rpc_url: parse_url_env(&format!("{prefix}_RPC_URL"), default_url)?,
        macaroon_path: parse_path_env(&format!("{prefix}_MACAROON_PATH")),
        tls_cert_path: parse_path_env(&format!("{prefix}_TLS_CERT_PATH")),
    })
}

/// Parse an environment variable with a default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse an optional environment variable.
fn parse_optional_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(val) if !val.trim().is_empty() => {
            val.trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::ParseError {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
        }
        _ => Ok(None),
    }
}

/// Parse a URL environment variable with a default value.
fn parse_url_env(name: &str, default: &str) -> Result<Url, ConfigError> {
    let url_str = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_url(name, &url_str)
}

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

fn parse_path_env(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}
