use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_auth::{AuthError, GuardError};
use serde::Serialize;
use tracing::{error, warn};

use crate::credentials::CredentialError;
use crate::profile::SyncError;

pub type ApiResult<T> = Result<T, ApiError>;

/// The single error-formatting boundary. Components raise their typed
/// failures; everything converges here before reaching the wire, and the
/// status split follows the taxonomy: 400 validation, 401 authentication
/// (generic body), 403 authorization, 404 missing resource, 500 internal.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
    }

    pub fn invalid_credentials() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "Invalid credentials",
        )
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(message = %message, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<CredentialError> for ApiError {
    fn from(value: CredentialError) -> Self {
        match value {
            CredentialError::DuplicateIdentifier => {
                Self::new(StatusCode::BAD_REQUEST, "DUPLICATE", "email already exists")
            }
            CredentialError::Validation(message) => Self::validation(message),
            CredentialError::NotFound => Self::not_found(),
            // Wrong, expired and unknown tokens all look the same outward.
            CredentialError::InvalidResetToken => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_TOKEN", "Invalid token")
            }
            CredentialError::Hash(message) => Self::internal(message),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        warn!(error = %value, "authentication failure");
        Self::new(
            StatusCode::UNAUTHORIZED,
            "AUTH_TOKEN",
            "Not authorized to access this route",
        )
    }
}

impl From<SyncError> for ApiError {
    fn from(value: SyncError) -> Self {
        match value {
            // A first-time profile needs at least one recognized region;
            // the claims, not the request shape, are what failed here.
            SyncError::RegionResolution => {
                Self::validation("no recognized region membership in claims")
            }
        }
    }
}

impl From<GuardError> for ApiError {
    fn from(value: GuardError) -> Self {
        let GuardError::Forbidden { required } = &value;
        warn!(required = ?required, "authorization failure");
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", "Insufficient role")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
