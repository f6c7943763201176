use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{AuthError, AuthResult};
use crate::identity::VerifiedIdentity;
use crate::roles::Role;

/// Normalized view of an externally-issued token's claims. The identity
/// provider namespaces its custom claims under a configurable URL prefix;
/// this type maps that untyped bag into a fixed struct so missing required
/// claims surface as typed errors instead of propagating as absent values.
#[derive(Debug, Clone, Serialize)]
pub struct ExternalClaims {
    pub subject: String,
    pub username: String,
    pub role: Role,
    /// Human-readable region names as asserted by the provider. Resolution
    /// to internal region ids happens at profile-sync time.
    pub regions: Vec<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: Option<String>,
    pub permissions: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub issuer: String,
    pub audience: Vec<String>,
    pub raw: Value,
}

impl ExternalClaims {
    /// Extract and validate claims from a decoded (already signature-checked)
    /// payload. `namespace` is the provider's custom-claim URL prefix without
    /// a trailing slash.
    pub fn from_value(value: Value, namespace: &str) -> AuthResult<Self> {
        let subject = required_str(&value, "sub")?.to_string();
        let issuer = required_str(&value, "iss")?.to_string();

        let username_key = format!("{namespace}/username");
        let role_key = format!("{namespace}/role");
        let regions_key = format!("{namespace}/regions");

        let username = value
            .get(&username_key)
            .and_then(Value::as_str)
            .ok_or(AuthError::MissingClaim("username"))?
            .to_string();

        let role_str = value
            .get(&role_key)
            .and_then(Value::as_str)
            .ok_or(AuthError::MissingClaim("role"))?;
        let role = role_str
            .parse::<Role>()
            .map_err(|_| AuthError::InvalidClaim("role", role_str.to_string()))?;

        let regions = string_list(value.get(&regions_key));
        let permissions = string_list(value.get("permissions"));

        let exp = value
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or(AuthError::MissingClaim("exp"))?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", exp.to_string()))?;

        let issued_at = match value.get("iat").and_then(Value::as_i64) {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        let audience = match value.get("aud") {
            Some(Value::String(single)) => vec![single.clone()],
            Some(Value::Array(_)) => string_list(value.get("aud")),
            _ => Vec::new(),
        };

        Ok(Self {
            subject,
            username,
            role,
            regions,
            given_name: optional_str(&value, "given_name"),
            family_name: optional_str(&value, "family_name"),
            email: optional_str(&value, "email"),
            permissions,
            expires_at,
            issued_at,
            issuer,
            audience,
            raw: value,
        })
    }

    pub fn into_identity(self) -> VerifiedIdentity {
        VerifiedIdentity {
            subject: self.subject.clone(),
            role: self.role,
            permissions: self.permissions.clone(),
            raw: self.raw.clone(),
        }
    }

    pub fn identity(&self) -> VerifiedIdentity {
        VerifiedIdentity {
            subject: self.subject.clone(),
            role: self.role,
            permissions: self.permissions.clone(),
            raw: self.raw.clone(),
        }
    }
}

fn required_str<'a>(value: &'a Value, key: &'static str) -> AuthResult<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .ok_or(AuthError::MissingClaim(key))
}

fn optional_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(|item| item.to_string())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|item| item.to_string())
                .collect()
        })
        .unwrap_or_default()
}
