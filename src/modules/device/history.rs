//! Bounded history of recent readings, used for the dashboard charts.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use utoipa::ToSchema;

use super::models::Reading;

/// Default number of samples kept in memory.
pub const MAX_HISTORY: usize = 20;

/// Reduced reading for charts.
///
/// Non-finite values become zero and integer fields are truncated, precision
/// is not needed here since alerting works on the full reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistorySample {
    /// Wall clock `HH:MM:SS` when the sample was recorded.
    pub time: String,
    pub pitch: f64,
    pub roll: f64,
    pub tof_drift_mm: i64,
    pub rain_1h_mm: f64,
    pub rain_total_mm: f64,
    pub temperature: f64,
    pub humidity: i64,
    pub soil_moisture: i64,
}

impl HistorySample {
    pub fn from_reading(reading: &Reading, now: DateTime<Local>) -> Self {
        HistorySample {
            time: now.format("%H:%M:%S").to_string(),
            pitch: float_or_zero(reading.pitch),
            roll: float_or_zero(reading.roll),
            tof_drift_mm: int_or_zero(reading.tof_drift_mm),
            rain_1h_mm: float_or_zero(reading.rain_1h_mm),
            rain_total_mm: float_or_zero(reading.rain_total_mm),
            temperature: float_or_zero(reading.temperature),
            humidity: int_or_zero(reading.humidity),
            soil_moisture: int_or_zero(reading.soil_moisture),
        }
    }
}

fn float_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn int_or_zero(value: f64) -> i64 {
    if value.is_finite() {
        value.trunc() as i64
    } else {
        0
    }
}

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<HistorySample>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Appends at the end, dropping the oldest sample when over capacity.
    pub fn append(&mut self, sample: HistorySample) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Owned copy, oldest first.
    pub fn snapshot(&self) -> Vec<HistorySample> {
        self.samples.iter().cloned().collect()
    }
}
