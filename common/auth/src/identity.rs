use async_trait::async_trait;
use serde_json::Value;

use crate::error::AuthResult;
use crate::roles::Role;

/// Request-scoped identity produced by either verification path. Built fresh
/// for every request and never cached across requests.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub role: Role,
    pub permissions: Vec<String>,
    pub raw: Value,
}

impl VerifiedIdentity {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|value| value == permission)
    }
}

/// The one contract both trust sources converge on. The external JWKS-backed
/// variant lives in this crate; the local shared-secret variant is provided
/// by the service that owns the credential records. Routes bind to exactly
/// one implementation.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_identity(&self, token: &str) -> AuthResult<VerifiedIdentity>;
}
