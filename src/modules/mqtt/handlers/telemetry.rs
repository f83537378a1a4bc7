use bytes::Bytes;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    modules::{
        device::{Applied, DeviceStore, HistoryRecord},
        mqtt::mqtt_client::MqttClient,
    },
    shared::{errors::DecodeError, sink::HistorySink},
};

/// Feeds telemetry messages into the device store and the history sink.
#[derive(Clone)]
pub struct IngestionController {
    store: DeviceStore,
    sink: Arc<dyn HistorySink>,
}

impl IngestionController {
    pub fn new(store: DeviceStore, sink: Arc<dyn HistorySink>) -> Self {
        IngestionController { store, sink }
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    /// Applies one message. Malformed payloads are logged and dropped; the
    /// sink write is spawned and never awaited here.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> Result<(), DecodeError> {
        let applied = match self.store.apply_reading(payload).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Error parsing MQTT message on '{}': {}", topic, e);
                return Err(e);
            }
        };

        debug!(
            "Reading applied: status={} pitch={} roll={}",
            applied.evaluation.status, applied.reading.pitch, applied.reading.roll
        );

        let record = history_record(&applied);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            match sink.append(&record).await {
                Ok(()) => debug!("Reading logged to {}", sink.describe()),
                Err(e) => error!("History sink error ({}): {}", sink.describe(), e),
            }
        });

        Ok(())
    }

    /// Handles messages one at a time until the route closes or `cancel`
    /// fires, then stops the watchdog.
    pub async fn run(self, topic: String, mut messages: mpsc::Receiver<Bytes>, cancel: CancellationToken) {
        info!("Listening for telemetry on {}", topic);

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = messages.recv() => message,
            };

            match message {
                Some(payload) => {
                    let _ = self.handle_message(&topic, &payload).await;
                }
                None => {
                    warn!("Telemetry route for {} closed", topic);
                    break;
                }
            }
        }

        self.store.shutdown().await;
        info!("Telemetry ingestion stopped");
    }
}

/// Sink record for an accepted message. Values come from the message itself
/// (absent fields as zero); the status is the merged one.
pub fn history_record(applied: &Applied) -> HistoryRecord {
    let payload = &applied.payload;
    let (gps_lat, gps_lng, gps_valid) = match payload.gps() {
        Some((lat, lng)) => (lat, lng, lat != 0.0 || lng != 0.0),
        None => (
            payload.lat.unwrap_or_default(),
            payload.lng.unwrap_or_default(),
            false,
        ),
    };

    HistoryRecord {
        gps_lat,
        gps_lng,
        gps_valid,
        humidity: payload.humidity.unwrap_or_default(),
        pitch: payload.pitch.unwrap_or_default(),
        rain_1h_mm: payload.rain_1h_mm.unwrap_or_default(),
        rain_total_mm: payload.rain_total_mm.unwrap_or_default(),
        roll: payload.roll.unwrap_or_default(),
        soil_moisture: payload.soil_moisture.unwrap_or_default(),
        status: applied.evaluation.status,
        temperature: payload.temperature.unwrap_or_default(),
        timestamp: applied.received_at,
        tof_drift_mm: payload.tof_drift_mm.unwrap_or_default(),
    }
}

/// Copies the transport connection flag into the store.
pub async fn mirror_connection(
    store: DeviceStore,
    mut connection: watch::Receiver<bool>,
    cancel: CancellationToken,
) {
    loop {
        let connected = *connection.borrow_and_update();
        store.set_connected(connected).await;

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    store.set_connected(false).await;
}

pub async fn handler(
    client: &MqttClient,
    controller: IngestionController,
    topic: &str,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let messages = client.add_topic_route(topic).await;

    tokio::spawn(mirror_connection(
        controller.store().clone(),
        client.connection_watch(),
        cancel.clone(),
    ));

    tokio::spawn(controller.run(topic.to_string(), messages, cancel))
}
