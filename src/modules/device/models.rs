use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::evaluator::Status;

/// One merged telemetry snapshot for the device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reading {
    pub device_id: String,
    /// Device clock, epoch millis.
    pub timestamp: i64,
    pub pitch: f64,
    pub roll: f64,
    pub tof_drift_mm: f64,
    pub rain_1h_mm: f64,
    pub rain_total_mm: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub gps_lat: f64,
    pub gps_lng: f64,
    pub gps_valid: bool,
}

/// Static description of the station, shown next to the live data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceInfo {
    pub name: String,
    pub location: String,
    pub sim_number: String,
}

/// Record appended to the history sink, one per accepted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub gps_lat: f64,
    pub gps_lng: f64,
    pub gps_valid: bool,
    pub humidity: f64,
    pub pitch: f64,
    pub rain_1h_mm: f64,
    pub rain_total_mm: f64,
    pub roll: f64,
    pub soil_moisture: f64,
    pub status: Status,
    pub temperature: f64,
    /// Server clock, epoch millis.
    pub timestamp: i64,
    pub tof_drift_mm: f64,
}

/// Observable changes of the device state.
///
/// `CriticalAlert` is emitted on every transition into [`Status::Critical`]
/// and is the hook for escalation (notifications, calls) outside the core.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    StatusChanged {
        previous: Status,
        current: Status,
        at: i64,
    },
    CriticalAlert {
        roll: f64,
        at: i64,
    },
    LivenessChanged {
        live: bool,
        at: i64,
    },
    ConnectionChanged {
        connected: bool,
        at: i64,
    },
}

impl DeviceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceEvent::StatusChanged { .. } => "status_changed",
            DeviceEvent::CriticalAlert { .. } => "critical_alert",
            DeviceEvent::LivenessChanged { .. } => "liveness_changed",
            DeviceEvent::ConnectionChanged { .. } => "connection_changed",
        }
    }
}
