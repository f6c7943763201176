use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderValue};

use crate::claims::ExternalClaims;
use crate::error::{AuthError, AuthResult};
use crate::identity::VerifiedIdentity;
use crate::verifier::ExternalVerifier;

/// Extracts and verifies an externally-issued bearer token. Routes that
/// mount this extractor are statically bound to the external verification
/// path; the local path uses its own extractor in the service crate.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: ExternalClaims,
}

impl AuthContext {
    pub fn identity(&self) -> VerifiedIdentity {
        self.claims.identity()
    }

    pub fn into_claims(self) -> ExternalClaims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<ExternalVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let verifier = Arc::<ExternalVerifier>::from_ref(state);
        let claims = verifier.verify(&token).await?;
        Ok(Self { claims })
    }
}

/// Pull the bearer token out of a request's `Authorization` header. Shared
/// by both verification paths so they agree on what a well-formed header is.
pub fn bearer_token(parts: &Parts) -> AuthResult<String> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?;
    parse_bearer(header)
}

/// Strict `Bearer <token>` parsing: exact scheme, non-empty remainder.
pub fn parse_bearer(value: &HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?
        .trim();

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthorization)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}
