use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::api::views;

/// Failures a handler cannot recover from with a redirect.
#[derive(Debug)]
pub enum ServiceError {
    Forbidden,
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::Forbidden => {
                (StatusCode::FORBIDDEN, views::error("Insufficient permissions.")).into_response()
            }
            Self::Internal(err) => {
                error!("Failed to handle request: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    views::error("Something went wrong. Please try again later."),
                )
                    .into_response()
            }
        }
    }
}
