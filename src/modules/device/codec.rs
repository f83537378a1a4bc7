use serde_json::Value;

use super::models::Reading;
use crate::modules::mqtt::models::TelemetryPayload;
use crate::shared::errors::DecodeError;

/// Decodes a raw MQTT payload. Only JSON objects are accepted.
pub fn decode(raw: &[u8]) -> Result<TelemetryPayload, DecodeError> {
    let value: Value = serde_json::from_slice(raw)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    Ok(serde_json::from_value(value)?)
}

/// Merges a decoded payload over the previous reading.
///
/// Fields absent from the payload keep their previous value. GPS is only
/// taken when the payload carries both coordinates.
pub fn merge(payload: &TelemetryPayload, previous: &Reading) -> Reading {
    let mut next = Reading {
        device_id: payload
            .id
            .clone()
            .unwrap_or_else(|| previous.device_id.clone()),
        timestamp: payload.ts.unwrap_or(previous.timestamp),
        pitch: payload.pitch.unwrap_or(previous.pitch),
        roll: payload.roll.unwrap_or(previous.roll),
        tof_drift_mm: payload.tof_drift_mm.unwrap_or(previous.tof_drift_mm),
        rain_1h_mm: payload.rain_1h_mm.unwrap_or(previous.rain_1h_mm),
        rain_total_mm: payload.rain_total_mm.unwrap_or(previous.rain_total_mm),
        temperature: payload.temperature.unwrap_or(previous.temperature),
        humidity: payload.humidity.unwrap_or(previous.humidity),
        soil_moisture: payload.soil_moisture.unwrap_or(previous.soil_moisture),
        ..previous.clone()
    };

    if let Some((lat, lng)) = payload.gps() {
        next.gps_lat = lat;
        next.gps_lng = lng;
        next.gps_valid = lat != 0.0 || lng != 0.0;
    }

    next
}
