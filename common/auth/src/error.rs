use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub type AuthResult<T> = Result<T, AuthError>;

/// Every way token verification can fail. The full variant detail is logged
/// server-side; callers only ever see one opaque 401 so a probing client
/// cannot learn which check rejected the token. Upstream key-set failures
/// fail closed through the same response.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("failed to decode token header: {0}")]
    InvalidHeader(String),
    #[error("token declares unpinned algorithm {0}")]
    AlgorithmMismatch(String),
    #[error("token missing kid header")]
    MissingKeyId,
    #[error("no decoding key available for kid '{0}'")]
    UnknownKeyId(String),
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("required claim '{0}' missing")]
    MissingClaim(&'static str),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    #[error("failed to parse decoding key for kid '{0}': {1}")]
    KeyParse(String, String),
    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(String),
    #[error("failed to parse JWKS response: {0}")]
    JwksDecode(String),
    #[error("JWKS entry missing key id (kid)")]
    JwksMissingKid,
    #[error("JWKS key '{0}' missing required RSA components")]
    JwksMissingComponents(String),
    #[error("JWKS key '{kid}' uses unsupported key type '{kty}'")]
    JwksUnsupportedKey { kid: String, kty: String },
    #[error("JWKS key '{kid}' uses unsupported alg '{alg}'")]
    JwksUnsupportedAlg { kid: String, alg: String },
    #[error("JWKS fetch rate cap exceeded")]
    FetchRateLimited,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(value.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        warn!(error = %self, "rejecting request");
        let body = ErrorBody {
            code: "AUTH_TOKEN",
            message: "Not authorized to access this route",
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
