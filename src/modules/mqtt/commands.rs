use async_trait::async_trait;
use log::{error, info, warn};
use rumqttc::QoS;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;

use super::{models::CommandPayload, mqtt_client::MqttClient};
use crate::shared::errors::{CommandError, TransportError};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound side of the transport, as seen by the command publisher.
#[async_trait]
pub trait CommandTransport: Send + Sync + 'static {
    fn is_connected(&self) -> bool;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;
}

#[async_trait]
impl CommandTransport for MqttClient {
    fn is_connected(&self) -> bool {
        MqttClient::is_connected(self)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        MqttClient::publish(self, topic, payload, QoS::AtLeastOnce).await
    }
}

/// Publishes commands to `<namespace>/<device>/<suffix>`.
///
/// Commands are never queued: while disconnected `send` fails immediately.
#[derive(Clone)]
pub struct CommandPublisher {
    transport: Arc<dyn CommandTransport>,
    namespace: String,
    device_id: String,
}

impl CommandPublisher {
    pub fn new(transport: Arc<dyn CommandTransport>, namespace: &str, device_id: &str) -> Self {
        CommandPublisher {
            transport,
            namespace: namespace.to_string(),
            device_id: device_id.to_string(),
        }
    }

    pub fn topic(&self, topic_suffix: &str) -> String {
        format!(
            "{}/{}/{}",
            self.namespace,
            self.device_id,
            topic_suffix.trim_matches('/')
        )
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Starts publishing and returns the topic without waiting for the
    /// broker; `on_complete` receives the outcome from a background task.
    pub fn send<F>(
        &self,
        topic_suffix: &str,
        payload: &CommandPayload,
        on_complete: F,
    ) -> Result<String, CommandError>
    where
        F: FnOnce(Result<(), CommandError>) + Send + 'static,
    {
        if !self.transport.is_connected() {
            warn!("MQTT not connected, cannot publish");
            return Err(CommandError::NotConnected);
        }

        let topic = self.topic(topic_suffix);
        let message = payload.to_bytes()?;
        let transport = Arc::clone(&self.transport);
        let task_topic = topic.clone();

        tokio::spawn(async move {
            let result = match timeout(PUBLISH_TIMEOUT, transport.publish(&task_topic, message)).await {
                Ok(result) => result.map_err(CommandError::from),
                Err(_) => Err(CommandError::Transport(TransportError::Timeout(PUBLISH_TIMEOUT))),
            };

            match &result {
                Ok(()) => info!("Command sent to {}", task_topic),
                Err(e) => error!("Publish error on '{}': {}", task_topic, e),
            }
            on_complete(result);
        });

        Ok(topic)
    }
}
