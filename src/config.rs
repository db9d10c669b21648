use crate::error::{RelayError, Result};
use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Viewer page and asset configuration
    pub viewer: ViewerConfig,
    /// Relay channel tuning
    pub relay: RelayConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Port for the relay (default: 8080)
    pub port: u16,
    /// Allowed CORS origins (comma-separated, empty = any origin)
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Externally reachable relay address substituted into the viewer page
    pub logger_host: String,
    /// Root directory of the built viewer bundle
    pub asset_dir: PathBuf,
    /// Viewer page template
    pub template_path: PathBuf,
    /// Token in the template replaced by `logger_host`
    pub host_placeholder: String,
    /// Command that produces the bundle when it is missing at startup
    pub build_command: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Events queued per viewer before it is considered lagging
    pub viewer_buffer_size: usize,
    /// Seconds to wait for links to close on shutdown
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let asset_dir = PathBuf::from(get_env_or("ASSET_DIR", "web/dist"));
        let template_path = env::var("VIEWER_TEMPLATE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| asset_dir.join("index.html"));

        let host_placeholder = get_env_or("VIEWER_HOST_PLACEHOLDER", "loggerhost");
        if host_placeholder.is_empty() {
            return Err(RelayError::InvalidConfig(
                "VIEWER_HOST_PLACEHOLDER must not be empty".into(),
            ));
        }

        let viewer_buffer_size: usize = get_env_or("VIEWER_BUFFER_SIZE", "256")
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                RelayError::InvalidConfig("VIEWER_BUFFER_SIZE must be a positive number".into())
            })?;

        let shutdown_grace_secs: u64 = get_env_or("SHUTDOWN_GRACE_SECS", "5")
            .parse()
            .map_err(|_| {
                RelayError::InvalidConfig(
                    "SHUTDOWN_GRACE_SECS must be a valid number of seconds".into(),
                )
            })?;

        Ok(Config {
            server: ServerConfig {
                host: get_env_or("RELAY_BIND_HOST", "0.0.0.0"),
                port: get_env_or("RELAY_PORT", "8080").parse().map_err(|_| {
                    RelayError::InvalidConfig("RELAY_PORT must be a valid port number".into())
                })?,
                cors_origins: get_env_or("CORS_ORIGINS", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            viewer: ViewerConfig {
                logger_host: logger_host(),
                asset_dir,
                template_path,
                host_placeholder,
                build_command: env::var("VIEWER_BUILD_COMMAND")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            },
            relay: RelayConfig {
                viewer_buffer_size,
                shutdown_grace_secs,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the listening address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// `LOGGER_HOST`, falling back to the lowercase `loggerhost` older deployments set
fn logger_host() -> String {
    env::var("LOGGER_HOST")
        .or_else(|_| env::var("loggerhost"))
        .unwrap_or_default()
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
