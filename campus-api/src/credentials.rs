use std::collections::HashMap;
use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use common_auth::Role;
use rand_core::OsRng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Locally-issued credential: unique identifier plus a salted adaptive hash
/// of the secret. The hash and the reset fields never serialize outward.
#[derive(Debug, Clone, Serialize)]
pub struct Credential {
    pub id: Uuid,
    pub identifier: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_expires_at: Option<DateTime<Utc>>,
    /// Weak back-reference to the profile this credential maps onto.
    pub profile_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("identifier already exists")]
    DuplicateIdentifier,
    #[error("{0}")]
    Validation(String),
    #[error("credential not found")]
    NotFound,
    #[error("invalid or expired reset token")]
    InvalidResetToken,
    #[error("failed to hash secret: {0}")]
    Hash(String),
}

/// In-process credential store. Stands in for the opaque persistent store
/// the deployment wires up; exposes the unique-key lookups, partial updates
/// and the conditional reset-consume the handlers need.
#[derive(Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<HashMap<Uuid, Credential>>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(
        &self,
        identifier: &str,
        role: Role,
        password: &str,
    ) -> Result<Credential, CredentialError> {
        let identifier = validate_identifier(identifier)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let mut guard = self.inner.write().await;
        if guard
            .values()
            .any(|existing| existing.identifier.eq_ignore_ascii_case(&identifier))
        {
            return Err(CredentialError::DuplicateIdentifier);
        }

        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4(),
            identifier,
            role,
            password_hash,
            reset_token_hash: None,
            reset_expires_at: None,
            profile_id: None,
            created_at: now,
            updated_at: now,
        };
        guard.insert(credential.id, credential.clone());
        Ok(credential)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<Credential> {
        let guard = self.inner.read().await;
        guard.get(&id).cloned()
    }

    pub async fn find_by_identifier(&self, identifier: &str) -> Option<Credential> {
        let guard = self.inner.read().await;
        guard
            .values()
            .find(|credential| credential.identifier.eq_ignore_ascii_case(identifier.trim()))
            .cloned()
    }

    pub async fn update_identifier(
        &self,
        id: Uuid,
        identifier: &str,
    ) -> Result<Credential, CredentialError> {
        let identifier = validate_identifier(identifier)?;
        let mut guard = self.inner.write().await;
        if guard
            .values()
            .any(|other| other.id != id && other.identifier.eq_ignore_ascii_case(&identifier))
        {
            return Err(CredentialError::DuplicateIdentifier);
        }
        let credential = guard.get_mut(&id).ok_or(CredentialError::NotFound)?;
        credential.identifier = identifier;
        credential.updated_at = Utc::now();
        Ok(credential.clone())
    }

    pub async fn update_role(&self, id: Uuid, role: Role) -> Result<Credential, CredentialError> {
        let mut guard = self.inner.write().await;
        let credential = guard.get_mut(&id).ok_or(CredentialError::NotFound)?;
        credential.role = role;
        credential.updated_at = Utc::now();
        Ok(credential.clone())
    }

    /// Replace the secret, recomputing the hash. Reset fields are untouched;
    /// only the reset-consume path clears them.
    pub async fn set_password(
        &self,
        id: Uuid,
        password: &str,
    ) -> Result<Credential, CredentialError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;
        let mut guard = self.inner.write().await;
        let credential = guard.get_mut(&id).ok_or(CredentialError::NotFound)?;
        credential.password_hash = password_hash;
        credential.updated_at = Utc::now();
        Ok(credential.clone())
    }

    /// Partial update for the reset fields. Skips identifier/secret
    /// validation on purpose: the credential's own required-field rules must
    /// not block this write.
    pub async fn store_reset(
        &self,
        id: Uuid,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<(), CredentialError> {
        let mut guard = self.inner.write().await;
        let credential = guard.get_mut(&id).ok_or(CredentialError::NotFound)?;
        credential.reset_token_hash = Some(token_hash);
        credential.reset_expires_at = Some(expires_at);
        Ok(())
    }

    /// Conditional update: replace the secret and clear both reset fields
    /// only if the stored hash still matches and has not expired. Runs under
    /// one writer lock so two concurrent consumes with the same token cannot
    /// both succeed.
    pub async fn consume_reset(
        &self,
        token_hash: &str,
        new_password: &str,
    ) -> Result<Credential, CredentialError> {
        validate_password(new_password)?;
        let new_hash = hash_password(new_password)?;
        let now = Utc::now();

        let mut guard = self.inner.write().await;
        let credential = guard
            .values_mut()
            .find(|credential| {
                credential.reset_token_hash.as_deref() == Some(token_hash)
                    && credential
                        .reset_expires_at
                        .map(|expires| expires > now)
                        .unwrap_or(false)
            })
            .ok_or(CredentialError::InvalidResetToken)?;

        credential.password_hash = new_hash;
        credential.reset_token_hash = None;
        credential.reset_expires_at = None;
        credential.updated_at = now;
        Ok(credential.clone())
    }

    pub async fn link_profile(&self, id: Uuid, profile_id: &str) -> Result<(), CredentialError> {
        let mut guard = self.inner.write().await;
        let credential = guard.get_mut(&id).ok_or(CredentialError::NotFound)?;
        credential.profile_id = Some(profile_id.to_string());
        Ok(())
    }
}

pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CredentialError::Hash(err.to_string()))
}

/// Constant-time comparison through the hasher's own verify primitive.
pub fn verify_password(stored_hash: &str, candidate: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn validate_identifier(identifier: &str) -> Result<String, CredentialError> {
    let identifier = identifier.trim().to_string();
    if identifier.is_empty() {
        return Err(CredentialError::Validation(
            "no email address provided".to_string(),
        ));
    }
    if identifier.len() > 100 {
        return Err(CredentialError::Validation(
            "email address cannot exceed 100 characters".to_string(),
        ));
    }
    let mut parts = identifier.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(CredentialError::Validation(
            "provided email address is not valid".to_string(),
        ));
    }
    Ok(identifier)
}

fn validate_password(password: &str) -> Result<(), CredentialError> {
    if password.len() < 8 {
        return Err(CredentialError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }
    if password.len() > 500 {
        return Err(CredentialError::Validation(
            "password cannot exceed 500 characters".to_string(),
        ));
    }
    Ok(())
}
