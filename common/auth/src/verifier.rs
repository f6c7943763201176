use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::Value;
use tracing::debug;

use async_trait::async_trait;

use crate::claims::ExternalClaims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::identity::{IdentityVerifier, VerifiedIdentity};
use crate::keys::KeyCache;

/// Verifier for tokens issued by the external identity provider (an
/// OpenID-Connect-style provider publishing a JWKS). The algorithm is pinned
/// to RS256; a token declaring anything else, including "none" or an HMAC
/// variant, is rejected before any key material is consulted.
#[derive(Clone)]
pub struct ExternalVerifier {
    config: JwtConfig,
    cache: KeyCache,
}

impl ExternalVerifier {
    pub fn new(config: JwtConfig, cache: KeyCache) -> Self {
        Self { config, cache }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn cache(&self) -> &KeyCache {
        &self.cache
    }

    pub async fn verify(&self, token: &str) -> AuthResult<ExternalClaims> {
        let header =
            decode_header(token).map_err(|err| AuthError::InvalidHeader(err.to_string()))?;

        if header.alg != Algorithm::RS256 {
            return Err(AuthError::AlgorithmMismatch(format!("{:?}", header.alg)));
        }

        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
        let key = self.cache.resolve(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.leeway = self.config.leeway_seconds.into();

        let token_data = decode::<Value>(token, &key, &validation)?;
        let claims = ExternalClaims::from_value(token_data.claims, &self.config.claim_namespace)?;
        debug!(kid, subject = %claims.subject, "verified external token");
        Ok(claims)
    }
}

#[async_trait]
impl IdentityVerifier for ExternalVerifier {
    async fn verify_identity(&self, token: &str) -> AuthResult<VerifiedIdentity> {
        Ok(self.verify(token).await?.into_identity())
    }
}
