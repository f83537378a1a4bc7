//! Publishes synthetic station telemetry to the configured device topic.
//!
//! Reads the same configuration file as the monitor. Every tenth message
//! tilts the slope past the roll threshold so alerts can be exercised.

use chrono::Utc;
use landslide_monitor::{config::Configs, logger, modules::mqtt::models::TelemetryPayload, modules::mqtt::MqttClient};
use rand::Rng;
use rumqttc::QoS;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PUBLISH_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logger::start_log();

    let configs = Configs::load_from_env()?;
    let mut mqtt_config = configs.mqtt.clone();
    mqtt_config.client_id = format!("{}-simulator", mqtt_config.client_id);

    let client = MqttClient::new(&mqtt_config)?;
    let cancel = CancellationToken::new();
    let event_loop = client.start(cancel.clone()).await?;

    let topic = configs.device.telemetry_topic();
    log::info!("Publishing telemetry to {} every {}s", topic, PUBLISH_INTERVAL.as_secs());

    let mut interval = tokio::time::interval(PUBLISH_INTERVAL);
    let mut sequence: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = interval.tick() => {}
        }

        sequence += 1;
        let payload = sample(&configs.device.id, sequence);
        let message = serde_json::to_vec(&payload)?;

        match client.publish(&topic, message, QoS::AtLeastOnce).await {
            Ok(()) => log::info!(
                "#{} pitch={:.1} roll={:.1} dtof={:.0}",
                sequence,
                payload.pitch.unwrap_or_default(),
                payload.roll.unwrap_or_default(),
                payload.tof_drift_mm.unwrap_or_default()
            ),
            Err(e) => log::error!("Publish failed: {}", e),
        }
    }

    cancel.cancel();
    let _ = event_loop.await;
    Ok(())
}

fn sample(device_id: &str, sequence: u64) -> TelemetryPayload {
    let mut rng = rand::thread_rng();
    let roll = if sequence % 10 == 0 {
        rng.gen_range(45.0..55.0)
    } else {
        rng.gen_range(-5.0..5.0)
    };

    TelemetryPayload {
        id: Some(device_id.to_string()),
        ts: Some(Utc::now().timestamp_millis()),
        pitch: Some(rng.gen_range(-10.0..35.0)),
        roll: Some(roll),
        tof_drift_mm: Some(rng.gen_range(0.0..40.0)),
        rain_1h_mm: Some(rng.gen_range(0.0..20.0)),
        rain_total_mm: Some(rng.gen_range(0.0..200.0)),
        temperature: Some(rng.gen_range(20.0..35.0)),
        humidity: Some(rng.gen_range(40.0..95.0)),
        soil_moisture: Some(rng.gen_range(10.0..80.0)),
        lat: Some(10.762622),
        lng: Some(106.660172),
    }
}
