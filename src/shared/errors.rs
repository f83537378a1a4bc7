use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use utoipa::ToSchema;
use warp::{http::StatusCode, reject::Reject, Rejection, Reply};

/// Telemetry payload that could not be decoded into a structured mapping.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a json object")]
    NotAnObject,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("failed to read certificate '{path}': {source}")]
    Certificate {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("mqtt event loop already started")]
    AlreadyStarted,
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sink responded with status {0}")]
    Status(u16),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("write timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("mqtt not connected, cannot publish")]
    NotConnected,
    #[error("failed to serialize command payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    BadRequest,
    Unavailable,
    Internal,
}

#[derive(Debug)]
pub struct AppError {
    pub err_type: ErrorType,
    pub message: String,
}

impl AppError {
    pub fn to_http_status(&self) -> StatusCode {
        match self.err_type {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorType::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CommandError> for AppError {
    fn from(err: CommandError) -> Self {
        let err_type = match err {
            CommandError::NotConnected => ErrorType::Unavailable,
            CommandError::Serialize(_) => ErrorType::BadRequest,
            CommandError::Transport(_) => ErrorType::Internal,
        };
        AppError {
            err_type,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Reject for AppError {}

#[derive(Serialize, ToSchema)]
pub struct ErrorMessage {
    pub code: u16,
    pub message: String,
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(app_err) = err.find::<AppError>() {
        (app_err.to_http_status(), app_err.message.clone())
    } else if let Some(body_err) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, body_err.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed".to_string(),
        )
    } else {
        log::error!("unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    let json = warp::reply::json(&ErrorMessage {
        code: code.as_u16(),
        message,
    });

    Ok(warp::reply::with_status(json, code))
}
