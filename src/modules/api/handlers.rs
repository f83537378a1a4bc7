use log::{info, warn};
use serde::Serialize;
use std::convert::Infallible;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use utoipa::ToSchema;
use warp::{http::StatusCode, sse::Event};

use super::ApiState;
use crate::{
    modules::{
        device::{
            history::HistorySample,
            store::{ActiveAlert, DeviceSnapshot},
            DeviceStore,
        },
        mqtt::models::CommandPayload,
    },
    shared::errors::{AppError, ErrorMessage},
};

/// Snapshot plus the derived labels the dashboard shows.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceView {
    pub device: DeviceSnapshot,
    pub severity: String,
    pub status_label: String,
    pub active_alerts: Vec<ActiveAlert>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommandAccepted {
    pub topic: String,
}

#[utoipa::path(
        get,
        path = "/device",
        responses(
            (status = 200, description = "Current device state", body = DeviceView),
        )
    )
]
pub async fn device_handler(state: ApiState) -> Result<impl warp::Reply, Infallible> {
    let device = state.store.snapshot().await;
    let view = DeviceView {
        severity: device.severity().to_string(),
        status_label: device.status_label(),
        active_alerts: device.active_alerts(),
        device,
    };

    Ok(warp::reply::json(&view))
}

#[utoipa::path(
        get,
        path = "/device/history",
        responses(
            (status = 200, description = "Recent samples, oldest first", body = Vec<HistorySample>),
        )
    )
]
pub async fn history_handler(state: ApiState) -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(&state.store.history().await))
}

#[utoipa::path(
        get,
        path = "/device/alerts",
        responses(
            (status = 200, description = "Active alerts in display order", body = Vec<ActiveAlert>),
        )
    )
]
pub async fn alerts_handler(state: ApiState) -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(&state.store.active_alerts().await))
}

#[utoipa::path(
        post,
        path = "/device/commands/{suffix}",
        params(("suffix" = String, Path, description = "Topic suffix under the device namespace")),
        request_body(content = String, description = "Command payload, a JSON string or object"),
        responses(
            (status = 202, description = "Command handed to the broker", body = CommandAccepted),
            (status = 400, description = "Invalid payload", body = ErrorMessage),
            (status = 503, description = "MQTT not connected", body = ErrorMessage),
        )
    )
]
pub async fn command_handler(
    suffix: String,
    payload: CommandPayload,
    state: ApiState,
) -> Result<impl warp::Reply, warp::Rejection> {
    let topic = state
        .commands
        .send(&suffix, &payload, |result| {
            if let Err(e) = result {
                warn!("Command delivery failed: {}", e);
            }
        })
        .map_err(|e| warp::reject::custom(AppError::from(e)))?;

    info!("Command accepted for {}", topic);
    Ok(warp::reply::with_status(
        warp::reply::json(&CommandAccepted { topic }),
        StatusCode::ACCEPTED,
    ))
}

/// Device events as server-sent events, named after the event type.
pub fn event_stream(
    store: &DeviceStore,
) -> impl Stream<Item = Result<Event, serde_json::Error>> + Send + 'static {
    BroadcastStream::new(store.subscribe()).filter_map(|item| match item {
        Ok(event) => Some(Event::default().event(event.name()).json_data(&event)),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("Event stream lagged, {} events skipped", skipped);
            None
        }
    })
}
