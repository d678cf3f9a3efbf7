use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::AppError;
use crate::SessionError;
use crate::session::Session;

/// Extracts the session installed by [`session_middleware`](super::session_middleware).
///
/// Rejects with a 500 when the middleware is missing from the route.
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            AppError(SessionError::ConfigurationError(
                "session middleware is not installed".to_owned(),
            ))
        })
    }
}
