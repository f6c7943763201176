use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::identity::VerifiedIdentity;
use crate::roles::Role;

/// Authorization failure: the identity verified fine but does not hold a
/// required role or permission. Distinct from verification failure (401)
/// and always surfaced as 403. The required set stays server-side.
#[derive(Debug, Clone)]
pub enum GuardError {
    Forbidden { required: Vec<String> },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let GuardError::Forbidden { required } = &self;
        warn!(required = ?required, "insufficient role or permissions");
        let body = ErrorBody {
            code: "FORBIDDEN",
            message: "Insufficient role",
        };
        (StatusCode::FORBIDDEN, Json(body)).into_response()
    }
}

/// Pure set-membership check: the identity's role must appear in `allowed`.
/// An empty `allowed` set admits nobody; a route open to every verified
/// identity passes `ROLE_ANY`, never an empty slice.
pub fn ensure_role(identity: &VerifiedIdentity, allowed: &[Role]) -> Result<(), GuardError> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(GuardError::Forbidden {
            required: allowed.iter().map(|role| role.to_string()).collect(),
        })
    }
}

/// Capability variant: the identity's permission set must intersect
/// `required`. Empty intersection is the only failure condition, so an
/// empty `required` set rejects like any other non-match.
pub fn ensure_permissions(
    identity: &VerifiedIdentity,
    required: &[&str],
) -> Result<(), GuardError> {
    let granted = identity
        .permissions
        .iter()
        .any(|permission| required.iter().any(|item| permission == item));

    if granted {
        Ok(())
    } else {
        Err(GuardError::Forbidden {
            required: required.iter().map(|value| value.to_string()).collect(),
        })
    }
}
