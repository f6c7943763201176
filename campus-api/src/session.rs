use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use common_auth::{bearer_token, VerifiedIdentity};

use crate::app::AppState;
use crate::credentials::Credential;
use crate::error::ApiError;

/// Extractor for the locally-issued token path: bearer parse, HS256 verify,
/// credential lookup. Routes mounting this are statically bound to local
/// verification, never to the external JWKS path.
#[derive(Debug, Clone)]
pub struct Session {
    pub credential: Credential,
    pub identity: VerifiedIdentity,
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let state = AppState::from_ref(state);

        let (credential, identity) = state.local.verify_credential(&token).await?;
        Ok(Self {
            credential,
            identity,
        })
    }
}
