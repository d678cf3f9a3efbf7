use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use futures::future::{Ready, ready};

use super::error::SessionRequestError;
use crate::SessionError;
use crate::session::Session;

/// Extracts the session installed by [`SessionPersistence`](super::SessionPersistence).
impl FromRequest for Session {
    type Error = SessionRequestError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let session = req.extensions().get::<Session>().cloned();

        ready(session.ok_or_else(|| SessionRequestError {
            error: SessionError::ConfigurationError(
                "session persistence middleware is not installed".to_owned(),
            ),
        }))
    }
}
