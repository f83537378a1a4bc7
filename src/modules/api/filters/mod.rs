use serde::de::DeserializeOwned;
use std::convert::Infallible;
use warp::{self, http::Method, Filter};

use super::ApiState;

pub fn with_state(
    state: ApiState,
) -> impl Filter<Extract = (ApiState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn with_json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(1024 * 16).and(warp::body::json())
}

/// The dashboard is served from another origin.
pub fn with_cors() -> warp::filters::cors::Cors {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["Content-Type"])
        .allow_methods(&[Method::GET, Method::POST])
        .build()
}
