//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use stillroom_core::StorageError;
use tracing::error;

/// Error returned by a handler. Every variant renders as `{"error": "..."}`.
///
/// Store failures of any kind, a store that cannot be reached included,
/// surface as 500.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_message(self) -> String {
        match self {
            ApiError::BadRequest(m) | ApiError::NotFound(m) | ApiError::Internal(m) => m,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Validation(v) => ApiError::BadRequest(v.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.into_message();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "request failed");
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stillroom_core::ValidationError;

    #[test]
    fn storage_errors_map_to_listed_statuses() {
        let invalid = StorageError::Validation(ValidationError::MissingField("presetName".into()));
        assert_eq!(ApiError::from(invalid).status(), StatusCode::BAD_REQUEST);

        for err in [
            StorageError::Unavailable("connection refused".into()),
            StorageError::Locked,
            StorageError::QueryFailed("no such table".into()),
        ] {
            assert_eq!(ApiError::from(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
