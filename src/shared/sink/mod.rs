mod file;
mod realtime_db;

pub use file::JsonFileSink;
pub use realtime_db::RealtimeDbSink;

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};

use crate::config::{SinkConfig, SinkKind};
use crate::modules::device::HistoryRecord;
use crate::shared::errors::{ConfigError, SinkError};

/// Append-only destination for historical readings.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append(&self, record: &HistoryRecord) -> Result<(), SinkError>;

    /// Human readable target, for logs.
    fn describe(&self) -> String;
}

/// Sink used when persistence is turned off.
#[derive(Debug, Default)]
pub struct DisabledSink;

#[async_trait]
impl HistorySink for DisabledSink {
    async fn append(&self, _record: &HistoryRecord) -> Result<(), SinkError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "disabled".to_string()
    }
}

/// Logical sink path for a device.
pub fn default_path(device_id: &str) -> String {
    format!("devices/{}/history/readings", device_id)
}

pub fn from_config(
    config: &SinkConfig,
    device_id: &str,
) -> Result<Arc<dyn HistorySink>, ConfigError> {
    let path = config
        .path
        .clone()
        .unwrap_or_else(|| default_path(device_id));

    let sink: Arc<dyn HistorySink> = match config.kind {
        SinkKind::Disabled => Arc::new(DisabledSink),
        SinkKind::File => {
            let dir = config
                .dir
                .as_ref()
                .ok_or_else(|| ConfigError::Invalid("sink.dir is required for the file sink".into()))?;
            Arc::new(JsonFileSink::new(
                dir,
                &path,
                Duration::from_secs(config.timeout_secs),
            ))
        }
        SinkKind::RealtimeDb => {
            let base_url = config.base_url.as_ref().ok_or_else(|| {
                ConfigError::Invalid("sink.base_url is required for the realtime_db sink".into())
            })?;
            let sink = RealtimeDbSink::new(
                base_url,
                &path,
                config.auth_token.clone(),
                Duration::from_secs(config.timeout_secs),
            )
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            Arc::new(sink)
        }
    };

    log::info!("History sink: {}", sink.describe());
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_each_kind() {
        let dir = tempfile::tempdir().unwrap();

        let disabled = from_config(&SinkConfig::default(), "dev").unwrap();
        assert_eq!(disabled.describe(), "disabled");

        let file = from_config(
            &SinkConfig {
                kind: SinkKind::File,
                dir: Some(dir.path().to_string_lossy().to_string()),
                ..Default::default()
            },
            "dev",
        )
        .unwrap();
        assert!(file.describe().ends_with("devices_dev_history_readings.jsonl"));

        let realtime = from_config(
            &SinkConfig {
                kind: SinkKind::RealtimeDb,
                base_url: Some("https://example.firebaseio.com/".to_string()),
                ..Default::default()
            },
            "dev",
        )
        .unwrap();
        assert_eq!(
            realtime.describe(),
            "https://example.firebaseio.com/devices/dev/history/readings.json"
        );
    }

    #[test]
    fn missing_settings_are_rejected() {
        let file = SinkConfig {
            kind: SinkKind::File,
            ..Default::default()
        };
        assert!(matches!(from_config(&file, "dev"), Err(ConfigError::Invalid(_))));

        let realtime = SinkConfig {
            kind: SinkKind::RealtimeDb,
            ..Default::default()
        };
        assert!(matches!(
            from_config(&realtime, "dev"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
