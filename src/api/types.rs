use serde::{Deserialize, Serialize};

use crate::SessionError;

/// JSON body returned when session handling fails a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<SessionError> for ErrorResponse {
    fn from(err: SessionError) -> Self {
        let code = match &err {
            SessionError::Storage(_) => "SESSION_STORAGE_ERROR",
            SessionError::Corrupt(_) => "SESSION_STORE_CORRUPT",
            SessionError::Serialization(_) => "SESSION_SERIALIZATION_ERROR",
            SessionError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            SessionError::Internal(_) => "INTERNAL_ERROR",
        };

        ErrorResponse {
            error: err.to_string(),
            code: code.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_from_session_error() {
        let response = ErrorResponse::from(SessionError::Storage("connection refused".to_owned()));
        assert_eq!(response.code, "SESSION_STORAGE_ERROR");
        assert_eq!(response.error, "Storage error: connection refused");
    }
}
