mod filters;
pub mod handlers;
mod routes;
mod swagger;

use crate::modules::{device::DeviceStore, mqtt::CommandPublisher};
use crate::shared::errors::handle_rejection;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use utoipa::OpenApi;
use warp::Filter;

pub use swagger::MonitorDoc;

#[derive(OpenApi)]
#[openapi(paths(
    handlers::device_handler,
    handlers::history_handler,
    handlers::alerts_handler,
    handlers::command_handler
))]
pub struct MonitorApi;

/// What the HTTP layer reads from and publishes through.
#[derive(Clone)]
pub struct ApiState {
    pub store: DeviceStore,
    pub commands: CommandPublisher,
}

/// All routes under `/api`, with CORS and error rendering.
pub fn api_routes(
    state: ApiState,
) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
    warp::path!("api" / ..)
        .and(
            routes::api_doc_route()
                .or(routes::device_route(state.clone()))
                .or(routes::history_route(state.clone()))
                .or(routes::alerts_route(state.clone()))
                .or(routes::events_route(state.clone()))
                .or(routes::commands_route(state)),
        )
        .with(filters::with_cors())
        .recover(handle_rejection)
}

pub fn start_api(
    state: ApiState,
    addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, warp::Error> {
    let routes = api_routes(state);
    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, async move { cancel.cancelled().await })?;

    log::info!("Starting API on {}...", bound);
    Ok(tokio::spawn(server))
}
