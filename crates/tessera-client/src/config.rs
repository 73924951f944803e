//! Client configuration.
//!
//! Three loaders: [`ClientConfig::from_env`] for headless deployments,
//! [`ClientConfig::from_file`] for a YAML file with environment overrides,
//! and [`ClientConfig::parse`] for an in-memory YAML document. All of them
//! validate before returning.
//!
//! Environment variables:
//! - `TESSERA_SERVER_ADDR` -- `host:port` of the simulation server (required)
//! - `TESSERA_CLIENT_TOKEN` -- durable client token (random if unset)
//! - `TESSERA_REQUEST_TIMEOUT_MS` -- per-request deadline (default 5000)
//! - `TESSERA_SUPERVISOR_INTERVAL_MS` -- reconnect/keepalive tick (default 1000)
//! - `TESSERA_KEEPALIVE_IDLE_MS` -- idle time before a ping (default 5000)
//! - `TESSERA_GRID_PITCH` -- hex grid pitch in pixels (default 100)

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tessera_grid::{DEFAULT_GRID_PITCH, HexLayout};
use tessera_types::ClientToken;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A required setting was not provided.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A setting was provided but is unusable.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Setting name.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Everything the transport and session need to know up front.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// Server address, `host:port`.
    #[serde(default)]
    pub server_addr: String,

    /// Token sent in the handshake and with every request.
    #[serde(default = "ClientToken::generate")]
    pub client_token: ClientToken,

    /// Deadline for each request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Period of the connection supervisor, in milliseconds.
    #[serde(default = "default_supervisor_interval_ms")]
    pub supervisor_interval_ms: u64,

    /// Outbound silence after which a keepalive ping is sent, in milliseconds.
    #[serde(default = "default_keepalive_idle_ms")]
    pub keepalive_idle_ms: u64,

    /// Hex grid pitch used for pixel projection.
    #[serde(default = "default_grid_pitch")]
    pub grid_pitch: f64,
}

impl ClientConfig {
    /// A configuration for `server_addr` with every other setting at its
    /// default and a freshly generated token.
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            client_token: ClientToken::generate(),
            request_timeout_ms: default_request_timeout_ms(),
            supervisor_interval_ms: default_supervisor_interval_ms(),
            keepalive_idle_ms: default_keepalive_idle_ms(),
            grid_pitch: default_grid_pitch(),
        }
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `TESSERA_SERVER_ADDR` is unset and
    /// [`ConfigError::Invalid`] if any value does not parse or validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(String::new());
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, and a
    /// validation error otherwise.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. The environment is not
    /// consulted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, and a
    /// validation error otherwise.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Overwrite settings with any `TESSERA_*` variable `lookup` knows.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric variable does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("TESSERA_SERVER_ADDR") {
            self.server_addr = addr;
        }
        if let Some(token) = lookup("TESSERA_CLIENT_TOKEN") {
            self.client_token = ClientToken::new(token);
        }
        if let Some(ms) = parse_var(&lookup, "TESSERA_REQUEST_TIMEOUT_MS")? {
            self.request_timeout_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "TESSERA_SUPERVISOR_INTERVAL_MS")? {
            self.supervisor_interval_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "TESSERA_KEEPALIVE_IDLE_MS")? {
            self.keepalive_idle_ms = ms;
        }
        if let Some(pitch) = parse_var(&lookup, "TESSERA_GRID_PITCH")? {
            self.grid_pitch = pitch;
        }
        Ok(())
    }

    /// Check that every setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for an empty server address and
    /// [`ConfigError::Invalid`] for zero durations or a bad grid pitch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_addr.trim().is_empty() {
            return Err(ConfigError::Missing("server_addr"));
        }
        for (key, value) in [
            ("request_timeout_ms", self.request_timeout_ms),
            ("supervisor_interval_ms", self.supervisor_interval_ms),
            ("keepalive_idle_ms", self.keepalive_idle_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_owned(),
                });
            }
        }
        if !self.grid_pitch.is_finite() || self.grid_pitch <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "grid_pitch",
                reason: format!("must be a positive number, got {}", self.grid_pitch),
            });
        }
        Ok(())
    }

    /// Request deadline.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Supervisor tick period.
    pub const fn supervisor_interval(&self) -> Duration {
        Duration::from_millis(self.supervisor_interval_ms)
    }

    /// Outbound idle time before a keepalive.
    pub const fn keepalive_idle(&self) -> Duration {
        Duration::from_millis(self.keepalive_idle_ms)
    }

    /// Pixel layout for the configured pitch.
    pub const fn layout(&self) -> HexLayout {
        HexLayout::new(self.grid_pitch)
    }
}

/// Look up and parse one optional variable.
fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

const fn default_request_timeout_ms() -> u64 {
    5000
}

const fn default_supervisor_interval_ms() -> u64 {
    1000
}

const fn default_keepalive_idle_ms() -> u64 {
    5000
}

const fn default_grid_pitch() -> f64 {
    DEFAULT_GRID_PITCH
}
