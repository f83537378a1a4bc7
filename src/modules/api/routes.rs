use utoipa::OpenApi;
use warp::Filter;

use super::{
    filters::{with_json_body, with_state},
    handlers::{alerts_handler, command_handler, device_handler, event_stream, history_handler},
    swagger::MonitorDoc,
    ApiState,
};
use crate::modules::mqtt::models::CommandPayload;

pub fn device_route(
    state: ApiState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("device")
        .and(warp::get())
        .and(with_state(state))
        .and_then(device_handler)
}

pub fn history_route(
    state: ApiState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("device" / "history")
        .and(warp::get())
        .and(with_state(state))
        .and_then(history_handler)
}

pub fn alerts_route(
    state: ApiState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("device" / "alerts")
        .and(warp::get())
        .and(with_state(state))
        .and_then(alerts_handler)
}

pub fn events_route(
    state: ApiState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("device" / "events")
        .and(warp::get())
        .and(with_state(state))
        .map(|state: ApiState| {
            warp::sse::reply(warp::sse::keep_alive().stream(event_stream(&state.store)))
        })
}

pub fn commands_route(
    state: ApiState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("device" / "commands" / String)
        .and(warp::post())
        .and(with_json_body::<CommandPayload>())
        .and(with_state(state))
        .and_then(command_handler)
}

pub fn api_doc_route() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("api-doc.json")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&MonitorDoc::openapi()))
}
