use api_shared::ErrorRes;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drive_core::{DriveError, ShardableUuid};

/// An error rendered as `{"error": "..."}` with its status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Maps a core error for a request made by `requester`.
    ///
    /// A permission failure on an anonymous request means "sign in first" and becomes 401;
    /// for a signed-in user it is 403.
    pub fn for_requester(error: DriveError, requester: Option<&ShardableUuid>) -> Self {
        match error {
            DriveError::PermissionDenied if requester.is_none() => Self::unauthorized(),
            other => other.into(),
        }
    }
}

impl From<DriveError> for ApiError {
    fn from(error: DriveError) -> Self {
        match error {
            DriveError::InvalidCredentials | DriveError::Unauthenticated => Self::unauthorized(),
            DriveError::PermissionDenied => Self::new(StatusCode::FORBIDDEN, "Forbidden"),
            DriveError::Validation(message) => Self::bad_request(message),
            DriveError::NotFound(message) => Self::new(StatusCode::NOT_FOUND, message),
            DriveError::DuplicateEmail => Self::new(StatusCode::CONFLICT, "Already exist"),
            other => {
                tracing::error!("request failed: {}", other);
                Self::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorRes::new(self.message))).into_response()
    }
}
