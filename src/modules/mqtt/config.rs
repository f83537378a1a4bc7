use serde::{Deserialize, Serialize};

fn default_client_id() -> String {
    "landslide-monitor".to_string()
}

fn default_keep_alive() -> u16 {
    30
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ca_cert: Option<String>,
    pub client_cert: Option<String>,
    pub client_key: Option<String>,
}
