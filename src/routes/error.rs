// Maps dispatch failures onto HTTP status codes with a JSON error body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::DispatchError;

#[derive(Debug)]
pub enum ApiError {
    Dispatch(DispatchError),
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Dispatch(DispatchError::RecipientNotFound(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Dispatch(DispatchError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Dispatch(DispatchError::Collaborator { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Dispatch(DispatchError::Delivery(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Dispatch(DispatchError::ConfigurationMissing { .. })
            | ApiError::Dispatch(DispatchError::MalformedRecord { .. })
            | ApiError::Dispatch(DispatchError::MetricOverflow { .. })
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        ApiError::Dispatch(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Dispatch(e) => e.to_string(),
            ApiError::Internal(e) => e.to_string(),
        };
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "request failed");
        }
        (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
    }
}
