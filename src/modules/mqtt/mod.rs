mod config;
pub mod commands;
pub mod handlers;
pub mod models;
mod mqtt_client;

pub use commands::{CommandPublisher, CommandTransport};
pub use config::MqttConfig;
pub use handlers::telemetry::IngestionController;
pub use mqtt_client::MqttClient;

use crate::{config::Configs, modules::device::DeviceStore, shared::errors::TransportError, shared::sink::HistorySink};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Running MQTT side of the service.
pub struct MqttService {
    pub client: MqttClient,
    pub commands: CommandPublisher,
    pub event_loop: JoinHandle<()>,
    pub ingestion: JoinHandle<()>,
}

pub async fn start_mqtt(
    configs: &Configs,
    store: DeviceStore,
    sink: Arc<dyn HistorySink>,
    cancel: CancellationToken,
) -> Result<MqttService, TransportError> {
    let client = MqttClient::new(&configs.mqtt)?;
    log::info!(
        "Connecting to MQTT broker: {}:{}",
        configs.mqtt.broker,
        configs.mqtt.port
    );

    let topic = configs.device.telemetry_topic();
    let controller = IngestionController::new(store, sink);
    let ingestion = handlers::telemetry::handler(&client, controller, &topic, cancel.clone()).await;

    // routes must exist before the first ConnAck
    let event_loop = client.start(cancel).await?;
    log::info!("Mqtt started...");

    let commands = CommandPublisher::new(
        Arc::new(client.clone()),
        &configs.device.namespace,
        &configs.device.id,
    );

    Ok(MqttService {
        client,
        commands,
        event_loop,
        ingestion,
    })
}
