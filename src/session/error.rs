// Session operation outcomes

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Failure outcomes of the session store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Unknown, deleted or expired session id
    #[error("Session not found")]
    NotFound,
    /// Throttle limit reached for the current window
    #[error("Request limit exceeded")]
    RateLimited,
    /// Session is not close enough to expiry to be extended
    #[error("Session does not need extension")]
    ExtensionNotNeeded,
    /// No unique session id could be minted
    #[error("Failed to create session")]
    GenerationFailure,
}

impl SessionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::NotFound => StatusCode::NOT_FOUND,
            SessionError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            SessionError::ExtensionNotNeeded => StatusCode::BAD_REQUEST,
            SessionError::GenerationFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}
