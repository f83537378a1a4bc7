use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::modules::device::{DeviceInfo, StoreOptions, Thresholds};
use crate::modules::mqtt::MqttConfig;
use crate::shared::errors::ConfigError;

/// Environment variable pointing at the TOML configuration file.
pub const CONFIG_ENV: &str = "MONITOR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Configs {
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(skip)]
    config_path: PathBuf,
}

impl Configs {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_content = fs::read_to_string(&path)?;
        let mut configs = Self::from_toml(&config_content)?;
        configs.config_path = path.as_ref().to_path_buf();
        Ok(configs)
    }

    /// Path from `MONITOR_CONFIG`, falling back to `./config.toml`.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_file(path)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let configs: Configs = toml::from_str(content)?;
        configs.validate()?;
        Ok(configs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.device.id.trim().is_empty() {
            return Err(ConfigError::Invalid("device.id must not be empty".into()));
        }
        if self.device.namespace.contains(['+', '#']) || self.device.id.contains(['+', '#', '/']) {
            return Err(ConfigError::Invalid(
                "device.id and device.namespace must not contain MQTT wildcards".into(),
            ));
        }
        if self.device.silence_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "device.silence_timeout_secs must be positive".into(),
            ));
        }
        if self.device.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "device.history_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            info: self.device.info(),
            thresholds: self.thresholds.clone(),
            silence_timeout: Duration::from_secs(self.device.silence_timeout_secs),
            history_capacity: self.device.history_capacity,
        }
    }

    pub fn log_config(&self) {
        log::info!("Configuration loaded from {}:", self.config_path.display());
        log::info!("  broker    : {}:{}", self.mqtt.broker, self.mqtt.port);
        log::info!("  device    : {}/{}", self.device.namespace, self.device.id);
        log::info!("  silence   : {}s", self.device.silence_timeout_secs);
        log::info!("  history   : {} samples", self.device.history_capacity);
        log::info!("  thresholds: {:?}", self.thresholds);
        log::info!("  sink      : {:?}", self.sink.kind);
        log::info!("  api       : {}:{}", self.api.host, self.api.port);
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub id: String,
    pub namespace: String,
    pub name: String,
    pub location: String,
    pub sim_number: String,
    pub silence_timeout_secs: u64,
    pub history_capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: "ESP32_LANDSLIDE_01".to_string(),
            namespace: "landslide".to_string(),
            name: "ESP32_LANDSLIDE_01".to_string(),
            location: "Monitoring Station 1".to_string(),
            sim_number: "N/A".to_string(),
            silence_timeout_secs: 5,
            history_capacity: 20,
        }
    }
}

impl DeviceConfig {
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: self.name.clone(),
            location: self.location.clone(),
            sim_number: self.sim_number.clone(),
        }
    }

    /// `<namespace>/<id>/<suffix>`
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}/{}", self.namespace, self.id, suffix)
    }

    pub fn telemetry_topic(&self) -> String {
        self.topic("telemetry")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    RealtimeDb,
    File,
    #[default]
    Disabled,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
    /// Logical path, defaults to `devices/<id>/history/readings`.
    pub path: Option<String>,
    pub dir: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig {
            kind: SinkKind::Disabled,
            base_url: None,
            auth_token: None,
            path: None,
            dir: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "0.0.0.0".to_string(),
            port: 3030,
        }
    }
}

impl ApiConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("api address: {}", e)))
    }
}
