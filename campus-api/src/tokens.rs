use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common_auth::{AuthError, AuthResult, IdentityVerifier, VerifiedIdentity};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::credentials::{Credential, CredentialStore};

/// Issues and verifies locally-signed (HS256, shared server secret) bearer
/// tokens. The token embeds the credential's internal id as subject; its
/// validity window comes from configuration and is independent of the
/// cookie lifetime set at the HTTP boundary.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct LocalClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        }
    }

    pub fn issue(&self, credential: &Credential) -> anyhow::Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(self.ttl_minutes);
        let claims = LocalClaims {
            sub: credential.id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| anyhow::anyhow!("Failed to sign token: {err}"))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature and expiration, returning the embedded subject id.
    pub fn verify(&self, token: &str) -> AuthResult<Uuid> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        let data = decode::<LocalClaims>(token, &self.decoding, &validation)?;
        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AuthError::InvalidClaim("sub", data.claims.sub.clone()))
    }
}

/// The local variant of the polymorphic verifier contract: resolves the
/// token's subject against the credential store to recover the role.
#[derive(Clone)]
pub struct LocalVerifier {
    signer: Arc<TokenSigner>,
    store: CredentialStore,
}

impl LocalVerifier {
    pub fn new(signer: Arc<TokenSigner>, store: CredentialStore) -> Self {
        Self { signer, store }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub async fn verify_credential(
        &self,
        token: &str,
    ) -> AuthResult<(Credential, VerifiedIdentity)> {
        let subject = self.signer.verify(token)?;
        let credential = self
            .store
            .find_by_id(subject)
            .await
            .ok_or_else(|| AuthError::Verification("subject no longer exists".to_string()))?;
        let identity = VerifiedIdentity {
            subject: credential.id.to_string(),
            role: credential.role,
            permissions: Vec::new(),
            raw: Value::Null,
        };
        Ok((credential, identity))
    }
}

#[async_trait]
impl IdentityVerifier for LocalVerifier {
    async fn verify_identity(&self, token: &str) -> AuthResult<VerifiedIdentity> {
        let (_, identity) = self.verify_credential(token).await?;
        Ok(identity)
    }
}
