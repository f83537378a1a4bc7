use landslide_monitor::{
    config::Configs,
    logger,
    modules::{
        api::{self, ApiState},
        device::{DeviceEvent, DeviceStore},
        mqtt,
    },
    shared::sink,
};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logger::start_log();

    let configs = Configs::load_from_env().map_err(|e| {
        log::error!("Failed to load configurations: {}", e);
        e
    })?;
    configs.log_config();

    let history_sink = sink::from_config(&configs.sink, &configs.device.id)?;
    let api_addr = configs.api.socket_addr()?;

    let cancel = CancellationToken::new();
    let store = DeviceStore::new(configs.store_options());
    let escalation = tokio::spawn(watch_events(store.clone(), cancel.clone()));

    let mqtt = mqtt::start_mqtt(&configs, store.clone(), history_sink, cancel.clone()).await?;

    let state = ApiState {
        store: store.clone(),
        commands: mqtt.commands.clone(),
    };
    let api = api::start_api(state, api_addr, cancel.clone())?;

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down...");
    cancel.cancel();

    let _ = tokio::join!(mqtt.event_loop, mqtt.ingestion, api, escalation);
    store.shutdown().await;

    Ok(())
}

/// Logs device events. A critical alert is where an emergency notification
/// would be triggered.
async fn watch_events(store: DeviceStore, cancel: CancellationToken) {
    let mut events = store.subscribe();

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(DeviceEvent::CriticalAlert { roll, .. }) => {
                log::warn!("EMERGENCY: roll angle {:.1}° on the monitored slope", roll);
            }
            Ok(DeviceEvent::LivenessChanged { live, .. }) => {
                log::info!("Device is {}", if live { "live" } else { "not live" });
            }
            Ok(DeviceEvent::ConnectionChanged { connected, .. }) => {
                log::info!("MQTT {}", if connected { "connected" } else { "offline" });
            }
            Ok(DeviceEvent::StatusChanged { .. }) => (),
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Event watcher lagged, {} events skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
