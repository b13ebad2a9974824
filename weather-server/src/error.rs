//! HTTP error handling for the forwarding endpoint.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use weather_core::{error::FALLBACK_MESSAGE, provider::openweather::UpstreamError};

/// Error body: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("City or Coordinates are required")]
    MissingQuery,

    #[error("Server configuration error: API Key missing")]
    Configuration,

    /// Provider answered with an error status; relayed as-is.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Internal Server Error")]
    Internal,
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::MissingQuery => StatusCode::BAD_REQUEST,
            ForwardError::Configuration | ForwardError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ForwardError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl From<UpstreamError> for ForwardError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status { status, message } => ForwardError::Upstream { status, message },
            UpstreamError::Request(detail) => {
                error!(%detail, "provider request failed");
                ForwardError::Upstream {
                    status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    message: FALLBACK_MESSAGE.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
