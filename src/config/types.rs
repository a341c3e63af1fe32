//! Configuration data types.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::routing::ModelType;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Address and port the proxy listens on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Key-value store connection settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Routing behaviour
    #[serde(default)]
    pub routing: RoutingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            listen: default_listen(),
            store: StoreConfig::default(),
            routing: RoutingConfig::default(),
        }
    }
}

/// Global configuration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Json,
            metrics: MetricsConfig::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Whether metrics endpoint is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address to bind metrics server
    #[serde(default = "default_metrics_address")]
    pub address: SocketAddr,

    /// Path for metrics endpoint
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_metrics_address(),
            path: default_metrics_path(),
        }
    }
}

/// Key-value store connection settings.
///
/// The idle-connection ceiling of 3 and the 240 second idle timeout match the
/// pool discipline the subgrid deployments have always run with.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Store server host
    #[serde(default = "default_store_host")]
    pub host: String,

    /// Store server port
    #[serde(default = "default_store_port")]
    pub port: u16,

    /// Optional password, sent at dial time
    #[serde(default)]
    pub password: Option<String>,

    /// Maximum number of idle connections retained by the pool
    #[serde(default = "default_max_idle")]
    pub max_idle: u32,

    /// How long an idle connection is kept before being closed
    #[serde(default = "default_idle_timeout", with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Timeout for establishing or checking out a connection
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Timeout for a single point read
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_store_host(),
            port: default_store_port(),
            password: None,
            max_idle: default_max_idle(),
            idle_timeout: default_idle_timeout(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
        }
    }
}

impl StoreConfig {
    /// The store's TCP address as `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection URL understood by the redis client.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}/", password, self.host, self.port),
            None => format!("redis://{}:{}/", self.host, self.port),
        }
    }
}

/// Routing behaviour configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Cache session identifiers per client address and fall back to the
    /// cache when a request carries no cookie (development environments)
    #[serde(default)]
    pub use_session_cache: bool,

    /// Fixed subgrid id: skip the session-to-subgrid lookup entirely and
    /// route every request to this workload
    #[serde(default)]
    pub single_server: Option<String>,

    /// How backend addresses are resolved
    #[serde(default)]
    pub address_mode: AddressMode,

    /// Backend port per model type (composed and local address modes)
    #[serde(default)]
    pub ports: VariantPorts,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            use_session_cache: false,
            single_server: None,
            address_mode: AddressMode::Composed,
            ports: VariantPorts::default(),
        }
    }
}

impl RoutingConfig {
    /// Whether this configuration requires a key-value store connection.
    ///
    /// Only the local address mode (single-server deployments) runs without
    /// one.
    pub fn needs_store(&self) -> bool {
        self.address_mode != AddressMode::Local
    }
}

/// Backend address resolution strategy.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AddressMode {
    /// `HGET subgrid_id_to_ip` plus the statically configured variant port
    #[default]
    Composed,
    /// `HGET subgrid_id_to_<variant>_address`, a full host:port per variant
    Direct,
    /// Loopback address plus variant port; no store interaction at all
    Local,
}

/// Backend port for each model type.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct VariantPorts {
    /// Port for the baseline `3di` model type
    #[serde(rename = "3di", default = "default_threedi_port")]
    pub threedi: u16,

    /// Port for the `3di-urban` model type
    #[serde(rename = "3di-urban", default = "default_urban_port")]
    pub urban: u16,
}

impl Default for VariantPorts {
    fn default() -> Self {
        Self {
            threedi: default_threedi_port(),
            urban: default_urban_port(),
        }
    }
}

impl VariantPorts {
    /// The configured port for a model type.
    pub fn port_for(&self, model_type: ModelType) -> u16 {
        match model_type {
            ModelType::ThreeDi => self.threedi,
            ModelType::ThreeDiUrban => self.urban,
        }
    }
}

// Default value functions
fn default_listen() -> SocketAddr {
    "0.0.0.0:5050".parse().unwrap()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_true() -> bool {
    true
}

fn default_metrics_address() -> SocketAddr {
    "127.0.0.1:9090".parse().unwrap()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_store_host() -> String {
    "127.0.0.1".to_string()
}

fn default_store_port() -> u16 {
    6379
}

fn default_max_idle() -> u32 {
    3
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(240)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_threedi_port() -> u16 {
    5000
}

fn default_urban_port() -> u16 {
    5010
}

/// Custom serde module for humantime durations.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
