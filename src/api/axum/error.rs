use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::SessionError;
use crate::api::ErrorResponse;

/// converts `SessionError` into an HTTP 500 response
#[derive(Debug)]
pub struct AppError(pub SessionError);

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_response = ErrorResponse::from(self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response)).into_response()
    }
}
