use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::credentials::{Credential, CredentialError, CredentialStore};

/// Single-use password-reset tokens. The plaintext token is handed to the
/// delivery channel exactly once; only its sha256 digest and an expiration
/// instant are persisted on the credential.
#[derive(Clone)]
pub struct ResetLedger {
    store: CredentialStore,
    ttl_minutes: i64,
}

impl ResetLedger {
    pub fn new(store: CredentialStore, ttl_minutes: i64) -> Self {
        Self { store, ttl_minutes }
    }

    /// Generate a token for the credential and persist its hash + expiry.
    pub async fn request(&self, credential: &Credential) -> Result<String, CredentialError> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::minutes(self.ttl_minutes);
        self.store
            .store_reset(credential.id, hash_token(&token), expires_at)
            .await?;
        Ok(token)
    }

    /// Redeem a plaintext token, replacing the secret and clearing both
    /// reset fields atomically. Wrong, expired and unknown tokens all
    /// collapse into the same `InvalidResetToken` failure.
    pub async fn consume(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<Credential, CredentialError> {
        self.store
            .consume_reset(&hash_token(token), new_password)
            .await
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::verify_password;
    use common_auth::Role;

    async fn ledger() -> (ResetLedger, CredentialStore, Credential) {
        let store = CredentialStore::new();
        let credential = store
            .create("a@x.com", Role::Student, "password123")
            .await
            .expect("create");
        (ResetLedger::new(store.clone(), 10), store, credential)
    }

    #[tokio::test]
    async fn request_persists_only_the_hash() {
        let (ledger, store, credential) = ledger().await;
        let token = ledger.request(&credential).await.expect("request");

        let stored = store.find_by_id(credential.id).await.expect("lookup");
        let hash = stored.reset_token_hash.expect("hash stored");
        assert_ne!(hash, token);
        assert!(stored.reset_expires_at.is_some());
    }

    #[tokio::test]
    async fn consume_replaces_secret_and_clears_fields() {
        let (ledger, store, credential) = ledger().await;
        let token = ledger.request(&credential).await.expect("request");

        let updated = ledger
            .consume(&token, "brand-new-password")
            .await
            .expect("consume");
        assert!(verify_password(&updated.password_hash, "brand-new-password"));
        assert!(!verify_password(&updated.password_hash, "password123"));

        let stored = store.find_by_id(credential.id).await.expect("lookup");
        assert!(stored.reset_token_hash.is_none());
        assert!(stored.reset_expires_at.is_none());
    }

    #[tokio::test]
    async fn a_different_token_fails_generically() {
        let (ledger, _, credential) = ledger().await;
        ledger.request(&credential).await.expect("request");

        let err = ledger
            .consume("00112233445566778899aabbccddeeff00112233", "new-password-1")
            .await
            .expect_err("unknown token");
        assert!(matches!(err, CredentialError::InvalidResetToken));
    }

    #[tokio::test]
    async fn second_consume_fails_before_expiry() {
        let (ledger, _, credential) = ledger().await;
        let token = ledger.request(&credential).await.expect("request");

        ledger
            .consume(&token, "new-password-1")
            .await
            .expect("first consume");
        let err = ledger
            .consume(&token, "new-password-2")
            .await
            .expect_err("token is single-use");
        assert!(matches!(err, CredentialError::InvalidResetToken));
    }

    #[tokio::test]
    async fn a_newer_request_supersedes_the_old_token() {
        let (ledger, _, credential) = ledger().await;
        let first = ledger.request(&credential).await.expect("first request");
        let second = ledger.request(&credential).await.expect("second request");

        assert!(ledger.consume(&first, "new-password-1").await.is_err());
        assert!(ledger.consume(&second, "new-password-2").await.is_ok());
    }
}
