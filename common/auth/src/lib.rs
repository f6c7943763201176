pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod identity;
pub mod jwks;
pub mod keys;
pub mod roles;
pub mod verifier;

pub use claims::ExternalClaims;
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::{bearer_token, parse_bearer, AuthContext};
pub use guards::{ensure_permissions, ensure_role, GuardError};
pub use identity::{IdentityVerifier, VerifiedIdentity};
pub use jwks::JwksFetcher;
pub use keys::KeyCache;
pub use roles::{Role, ROLE_ADMIN_ONLY, ROLE_ANY};
pub use verifier::ExternalVerifier;
