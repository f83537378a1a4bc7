//! Live ingestion, alerting and liveness tracking for a landslide monitoring
//! station reporting over MQTT.
//!
//! Telemetry flows from the broker through [`modules::mqtt`] into the
//! [`modules::device::DeviceStore`], which owns the merged reading, alert set,
//! status, bounded history and liveness watchdog. Accepted readings are also
//! appended to a [`shared::sink::HistorySink`], and [`modules::api`] exposes the
//! state to the dashboard.

pub mod config;
pub mod logger;
pub mod modules;
pub mod shared;
