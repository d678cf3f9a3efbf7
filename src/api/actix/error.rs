use actix_web::HttpResponse;

use crate::SessionError;
use crate::api::ErrorResponse;

#[derive(Debug)]
pub struct SessionRequestError {
    pub error: SessionError,
}

impl std::fmt::Display for SessionRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl From<SessionError> for SessionRequestError {
    fn from(error: SessionError) -> Self {
        Self { error }
    }
}

impl actix_web::ResponseError for SessionRequestError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::InternalServerError().json(ErrorResponse::from(self.error.clone()))
    }
}
