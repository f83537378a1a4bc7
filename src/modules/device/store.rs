use chrono::{Local, Utc};
use log::{info, warn};
use serde::Serialize;
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::{broadcast, RwLock};
use utoipa::ToSchema;

use super::{
    codec,
    evaluator::{evaluate, AlertSet, Evaluation, Status, Thresholds},
    history::{HistoryBuffer, HistorySample, MAX_HISTORY},
    models::{DeviceEvent, DeviceInfo, Reading},
    watchdog::{Liveness, Watchdog, SILENCE_TIMEOUT},
};
use crate::modules::mqtt::models::TelemetryPayload;
use crate::shared::errors::DecodeError;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub info: DeviceInfo,
    pub thresholds: Thresholds,
    pub silence_timeout: Duration,
    pub history_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            info: DeviceInfo {
                name: "ESP32_LANDSLIDE_01".to_string(),
                location: "Monitoring Station 1".to_string(),
                sim_number: "N/A".to_string(),
            },
            thresholds: Thresholds::default(),
            silence_timeout: SILENCE_TIMEOUT,
            history_capacity: MAX_HISTORY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct DeviceState {
    pub reading: Reading,
    pub alerts: AlertSet,
    pub status: Status,
    pub liveness: Liveness,
    pub mqtt_connected: bool,
    /// Server clock of the last accepted reading, epoch millis.
    pub last_update: Option<i64>,
    /// True until the first reading is accepted, never set again.
    pub loading: bool,
}

/// Result of an accepted reading.
#[derive(Debug, Clone)]
pub struct Applied {
    pub payload: TelemetryPayload,
    pub reading: Reading,
    pub evaluation: Evaluation,
    pub previous_status: Status,
    pub received_at: i64,
}

/// One alert as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ActiveAlert {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub icon: String,
    pub message: String,
    pub value: String,
}

/// Consistent copy of the device state taken under a single read lock.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeviceSnapshot {
    pub info: DeviceInfo,
    pub reading: Reading,
    pub alerts: AlertSet,
    pub status: Status,
    pub live: bool,
    pub mqtt_connected: bool,
    pub last_update: Option<i64>,
    pub loading: bool,
    pub history: Vec<HistorySample>,
}

impl DeviceSnapshot {
    pub fn severity(&self) -> &'static str {
        self.status.severity()
    }

    pub fn status_label(&self) -> String {
        self.status.label()
    }

    /// Active alerts in display order: pitch, drift, rain, roll.
    pub fn active_alerts(&self) -> Vec<ActiveAlert> {
        let mut alerts = Vec::new();
        let current = &self.reading;

        if self.alerts.pitch_alert {
            alerts.push(alert(
                "Pitch Angle",
                "pi-angle-double-up",
                "Pitch angle exceeded threshold",
                format!("{}°", format_value(current.pitch, 1)),
            ));
        }
        if self.alerts.tof_alert {
            alerts.push(alert(
                "Distance Drift",
                "pi-arrows-h",
                "Distance drift exceeded threshold",
                format!("{} mm", format_value(current.tof_drift_mm, 0)),
            ));
        }
        if self.alerts.rain_alert {
            alerts.push(alert(
                "Rainfall",
                "pi-cloud",
                "Rainfall exceeded threshold",
                format!("{} mm/h", format_value(current.rain_1h_mm, 1)),
            ));
        }
        if self.alerts.roll_alert {
            alerts.push(alert(
                "Roll Angle",
                "pi-exclamation-triangle",
                "CRITICAL: Roll angle ≥45° - Emergency call initiated",
                format!("{}°", format_value(current.roll, 1)),
            ));
        }

        alerts
    }
}

fn alert(kind: &str, icon: &str, message: &str, value: String) -> ActiveAlert {
    ActiveAlert {
        kind: kind.to_string(),
        severity: "danger".to_string(),
        icon: icon.to_string(),
        message: message.to_string(),
        value,
    }
}

/// Fixed precision, or `N/A` for values that are not numbers.
pub fn format_value(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", decimals, value)
    } else {
        "N/A".to_string()
    }
}

struct Guarded {
    state: DeviceState,
    history: HistoryBuffer,
    watchdog: Watchdog,
}

struct StoreInner {
    guarded: RwLock<Guarded>,
    info: DeviceInfo,
    thresholds: Thresholds,
    events: broadcast::Sender<DeviceEvent>,
}

/// Owner of the live device state.
///
/// `apply_reading` is the only writer of reading, alerts, status and history;
/// the watchdog is re-armed under the same write lock, and only its expiry
/// demotes liveness.
#[derive(Clone)]
pub struct DeviceStore {
    inner: Arc<StoreInner>,
}

impl DeviceStore {
    pub fn new(options: StoreOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = DeviceState {
            loading: true,
            ..Default::default()
        };

        DeviceStore {
            inner: Arc::new(StoreInner {
                guarded: RwLock::new(Guarded {
                    state,
                    history: HistoryBuffer::new(options.history_capacity),
                    watchdog: Watchdog::new(options.silence_timeout),
                }),
                info: options.info,
                thresholds: options.thresholds,
                events,
            }),
        }
    }

    /// Decodes, merges, evaluates and commits one telemetry payload.
    ///
    /// A payload that fails to decode leaves the state, history and liveness
    /// untouched.
    pub async fn apply_reading(&self, raw: &[u8]) -> Result<Applied, DecodeError> {
        let payload = codec::decode(raw)?;
        let now = Local::now();
        let received_at = now.timestamp_millis();

        let mut guarded = self.inner.guarded.write().await;

        let reading = codec::merge(&payload, &guarded.state.reading);
        let evaluation = evaluate(&reading, &self.inner.thresholds);
        let previous_status = guarded.state.status;

        guarded.state.reading = reading.clone();
        guarded.state.alerts = evaluation.alerts;
        guarded.state.status = evaluation.status;

        guarded
            .history
            .append(HistorySample::from_reading(&reading, now));

        let store = Arc::downgrade(&self.inner);
        guarded
            .watchdog
            .arm(move |generation| expire(store, generation));

        guarded.state.last_update = Some(received_at);
        guarded.state.loading = false;

        // events go out under the guard so subscribers see them in commit order
        if !guarded.state.liveness.is_live() {
            guarded.state.liveness = Liveness::Live;
            self.publish(DeviceEvent::LivenessChanged {
                live: true,
                at: received_at,
            });
        }

        let current = evaluation.status;
        if current != previous_status {
            info!("Device status changed: {} -> {}", previous_status, current);
            self.publish(DeviceEvent::StatusChanged {
                previous: previous_status,
                current,
                at: received_at,
            });
            if current == Status::Critical {
                warn!(
                    "CRITICAL: roll angle {}° crossed the emergency threshold",
                    format_value(reading.roll, 1)
                );
                self.publish(DeviceEvent::CriticalAlert {
                    roll: reading.roll,
                    at: received_at,
                });
            }
        }
        drop(guarded);

        Ok(Applied {
            payload,
            reading,
            evaluation,
            previous_status,
            received_at,
        })
    }

    /// Records the transport connection state.
    pub async fn set_connected(&self, connected: bool) {
        let mut guarded = self.inner.guarded.write().await;
        if guarded.state.mqtt_connected != connected {
            guarded.state.mqtt_connected = connected;
            self.publish(DeviceEvent::ConnectionChanged {
                connected,
                at: Utc::now().timestamp_millis(),
            });
        }
    }

    pub async fn snapshot(&self) -> DeviceSnapshot {
        let guarded = self.inner.guarded.read().await;
        DeviceSnapshot {
            info: self.inner.info.clone(),
            reading: guarded.state.reading.clone(),
            alerts: guarded.state.alerts,
            status: guarded.state.status,
            live: guarded.state.liveness.is_live(),
            mqtt_connected: guarded.state.mqtt_connected,
            last_update: guarded.state.last_update,
            loading: guarded.state.loading,
            history: guarded.history.snapshot(),
        }
    }

    pub async fn history(&self) -> Vec<HistorySample> {
        self.inner.guarded.read().await.history.snapshot()
    }

    pub async fn is_live(&self) -> bool {
        self.inner.guarded.read().await.state.liveness.is_live()
    }

    pub async fn active_alerts(&self) -> Vec<ActiveAlert> {
        self.snapshot().await.active_alerts()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.inner.events.subscribe()
    }

    /// Cancels the pending watchdog timer.
    pub async fn shutdown(&self) {
        self.inner.guarded.write().await.watchdog.cancel();
    }

    fn publish(&self, event: DeviceEvent) {
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

async fn expire(store: Weak<StoreInner>, generation: u64) {
    let Some(inner) = store.upgrade() else {
        return;
    };

    let mut guarded = inner.guarded.write().await;
    if guarded.watchdog.generation() != generation || !guarded.state.liveness.is_live() {
        return;
    }
    guarded.state.liveness = Liveness::Stale;

    warn!(
        "No data received for {}s, device is stale",
        guarded.watchdog.timeout().as_secs()
    );
    let _ = inner.events.send(DeviceEvent::LivenessChanged {
        live: false,
        at: Utc::now().timestamp_millis(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{task::yield_now, time::sleep};

    fn store() -> DeviceStore {
        DeviceStore::new(StoreOptions::default())
    }

    #[tokio::test(start_paused = true)]
    async fn starts_loading_and_stale() {
        let store = store();
        let snapshot = store.snapshot().await;
        assert!(snapshot.loading);
        assert!(!snapshot.live);
        assert!(!snapshot.mqtt_connected);
        assert_eq!(snapshot.status, Status::Normal);
        assert_eq!(snapshot.last_update, None);
        assert!(snapshot.history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pitch_reading_raises_warning() {
        let store = store();
        let applied = store
            .apply_reading(br#"{"pitch":32,"roll":5,"dtof":0,"rain1h":0}"#)
            .await
            .unwrap();

        assert_eq!(applied.evaluation.status, Status::Warning);
        let snapshot = store.snapshot().await;
        assert!(snapshot.alerts.pitch_alert);
        assert!(!snapshot.alerts.roll_alert);
        assert!(!snapshot.alerts.tof_alert);
        assert!(!snapshot.alerts.rain_alert);
        assert_eq!(snapshot.status, Status::Warning);
        assert_eq!(snapshot.severity(), "warn");
        assert_eq!(snapshot.status_label(), "WARNING");
        assert!(snapshot.live);
        assert!(!snapshot.loading);
        assert!(snapshot.last_update.is_some());
        assert_eq!(snapshot.history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn roll_after_normal_goes_critical_and_notifies() {
        let store = store();
        let mut events = store.subscribe();

        store.apply_reading(br#"{"pitch":1,"roll":2}"#).await.unwrap();
        assert_eq!(store.snapshot().await.status, Status::Normal);

        store.apply_reading(br#"{"roll":50}"#).await.unwrap();
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.status, Status::Critical);
        assert!(snapshot.alerts.roll_alert);
        assert_eq!(snapshot.reading.pitch, 1.0);

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event.name());
        }
        assert_eq!(
            received,
            vec!["liveness_changed", "status_changed", "critical_alert"]
        );

        // staying critical does not escalate again
        store.apply_reading(br#"{"roll":60}"#).await.unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payload_changes_nothing() {
        let store = store();
        store.apply_reading(br#"{"pitch":3}"#).await.unwrap();
        let before = store.snapshot().await;

        let result = store.apply_reading(b"this is not json").await;
        assert!(matches!(result, Err(DecodeError::Json(_))));

        let after = store.snapshot().await;
        assert_eq!(after.reading, before.reading);
        assert_eq!(after.history, before.history);
        assert_eq!(after.live, before.live);
        assert_eq!(after.last_update, before.last_update);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payload_is_not_proof_of_life() {
        let store = store();
        assert!(store.apply_reading(b"{broken").await.is_err());
        assert!(!store.is_live().await);
        assert!(store.snapshot().await.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_demotes_liveness_once() {
        let store = store();
        let mut events = store.subscribe();

        store.apply_reading(br#"{"pitch":1}"#).await.unwrap();
        assert!(store.is_live().await);

        sleep(Duration::from_millis(5_100)).await;
        yield_now().await;
        assert!(!store.is_live().await);

        sleep(Duration::from_secs(20)).await;
        let mut stale_events = 0;
        while let Ok(event) = events.try_recv() {
            if let DeviceEvent::LivenessChanged { live: false, .. } = event {
                stale_events += 1;
            }
        }
        assert_eq!(stale_events, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn message_before_expiry_keeps_device_live() {
        let store = store();
        store.apply_reading(br#"{"pitch":1}"#).await.unwrap();

        sleep(Duration::from_millis(4_900)).await;
        store.apply_reading(br#"{"pitch":2}"#).await.unwrap();

        sleep(Duration::from_millis(4_900)).await;
        yield_now().await;
        assert!(store.is_live().await);

        sleep(Duration::from_millis(200)).await;
        yield_now().await;
        assert!(!store.is_live().await);
    }

    #[tokio::test(start_paused = true)]
    async fn liveness_events_follow_commit_order() {
        let store = store();
        let mut events = store.subscribe();

        store.apply_reading(br#"{"pitch":1}"#).await.unwrap();
        sleep(Duration::from_secs(6)).await;
        yield_now().await;
        assert!(!store.is_live().await);

        store.apply_reading(br#"{"pitch":2}"#).await.unwrap();
        assert!(store.is_live().await);

        let mut liveness = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let DeviceEvent::LivenessChanged { live, .. } = event {
                liveness.push(live);
            }
        }
        assert_eq!(liveness, vec![true, false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_watchdog() {
        let store = store();
        store.apply_reading(br#"{"pitch":1}"#).await.unwrap();
        store.shutdown().await;

        sleep(Duration::from_secs(10)).await;
        yield_now().await;
        assert!(store.is_live().await);
    }

    #[tokio::test(start_paused = true)]
    async fn history_is_bounded() {
        let store = DeviceStore::new(StoreOptions {
            history_capacity: 3,
            ..Default::default()
        });
        for pitch in 0..5 {
            let raw = format!(r#"{{"pitch":{pitch}}}"#);
            store.apply_reading(raw.as_bytes()).await.unwrap();
        }
        let pitches: Vec<f64> = store.history().await.iter().map(|s| s.pitch).collect();
        assert_eq!(pitches, vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_changes_are_recorded_once() {
        let store = store();
        let mut events = store.subscribe();

        store.set_connected(true).await;
        store.set_connected(true).await;
        assert!(store.snapshot().await.mqtt_connected);

        let event = events.try_recv().unwrap();
        assert!(matches!(
            event,
            DeviceEvent::ConnectionChanged {
                connected: true,
                ..
            }
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn alert_list_formats_values() {
        let store = store();
        store
            .apply_reading(br#"{"pitch":32.456,"roll":-50,"dtof":35.4,"rain1h":20}"#)
            .await
            .unwrap();

        let alerts = store.active_alerts().await;
        let kinds: Vec<&str> = alerts.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec!["Pitch Angle", "Distance Drift", "Rainfall", "Roll Angle"]);

        let values: Vec<&str> = alerts.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, vec!["32.5°", "35 mm", "20.0 mm/h", "-50.0°"]);
        assert!(alerts.iter().all(|a| a.severity == "danger"));
        assert!(alerts[3].message.contains("Emergency call"));
    }

    #[test]
    fn non_numbers_format_as_placeholder() {
        assert_eq!(format_value(f64::NAN, 1), "N/A");
        assert_eq!(format_value(f64::INFINITY, 0), "N/A");
        assert_eq!(format_value(3.14159, 2), "3.14");
    }
}
