use anyhow::{anyhow, Context, Result};
use common_auth::JwtConfig;
use std::env;

/// Environment-sourced configuration; no CLI flags. Signing material
/// and the external-provider coordinates are required; everything else has
/// a default suitable for local development.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret for locally-issued (HS256) tokens.
    pub jwt_secret: String,
    /// Local token validity window, minutes.
    pub token_expire_minutes: i64,
    /// Cookie lifetime, days. Deliberately decoupled from the token's own
    /// expiration so the two clocks can be tuned separately.
    pub cookie_expire_days: i64,
    pub cookie_secure: bool,
    /// Password-reset token validity window, minutes.
    pub reset_token_expire_minutes: i64,
    /// External identity provider: expected `iss` and `aud` claims.
    pub external_issuer: String,
    pub external_audience: String,
    /// Custom-claim namespace; defaults to the issuer without trailing slash.
    pub claim_namespace: Option<String>,
    /// JWKS endpoint; defaults to `{issuer}/.well-known/jwks.json`.
    pub jwks_url: Option<String>,
    /// Outbound JWKS fetch cap, requests per minute.
    pub jwks_requests_per_minute: u32,
    /// Region names seeded into the translation table at startup.
    pub region_names: Vec<String>,
}

impl AppConfig {
    pub fn jwks_url(&self) -> String {
        match &self.jwks_url {
            Some(url) => url.clone(),
            None => format!(
                "{}/.well-known/jwks.json",
                self.external_issuer.trim_end_matches('/')
            ),
        }
    }

    pub fn jwt_config(&self) -> JwtConfig {
        let config = JwtConfig::new(&self.external_issuer, &self.external_audience);
        match &self.claim_namespace {
            Some(namespace) => config.with_claim_namespace(namespace),
            None => config,
        }
    }
}

pub fn load_config() -> Result<AppConfig> {
    let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
    if jwt_secret.trim().is_empty() {
        return Err(anyhow!("JWT_SECRET must not be empty"));
    }

    let external_issuer = env::var("JWT_ISSUER").context("JWT_ISSUER must be set")?;
    let external_audience = env::var("JWT_AUDIENCE").context("JWT_AUDIENCE must be set")?;

    let token_expire_minutes =
        positive_from_env("JWT_EXPIRE", 60).context("Failed to parse JWT_EXPIRE")?;
    let cookie_expire_days = positive_from_env("JWT_COOKIE_EXPIRE", 1)
        .context("Failed to parse JWT_COOKIE_EXPIRE")?;
    let reset_token_expire_minutes = positive_from_env("PASSWORD_RESET_TOKEN_EXPIRE", 10)
        .context("Failed to parse PASSWORD_RESET_TOKEN_EXPIRE")?;
    let jwks_requests_per_minute = rate_cap_from_env("JWKS_REQUESTS_PER_MINUTE", 5)
        .context("Failed to parse JWKS_REQUESTS_PER_MINUTE")?;

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(4000);

    let region_names = env::var("REGION_NAMES")
        .ok()
        .map(|value| parse_list(&value))
        .unwrap_or_default();

    Ok(AppConfig {
        host,
        port,
        jwt_secret,
        token_expire_minutes,
        cookie_expire_days,
        cookie_secure: bool_from_env("COOKIE_SECURE").unwrap_or(false),
        reset_token_expire_minutes,
        external_issuer,
        external_audience,
        claim_namespace: env::var("CLAIM_NAMESPACE").ok().and_then(|v| normalize_optional(&v)),
        jwks_url: env::var("JWKS_URL").ok().and_then(|v| normalize_optional(&v)),
        jwks_requests_per_minute,
        region_names,
    })
}

/// Durations (minutes, days) must be strictly positive; a zero or negative
/// window would issue already-expired tokens.
fn positive_from_env(key: &str, default: i64) -> Result<i64> {
    match int_from_env(key)? {
        Some(value) if value > 0 => Ok(value),
        Some(value) => Err(anyhow!("{key} must be positive, got {value}")),
        None => Ok(default),
    }
}

fn rate_cap_from_env(key: &str, default: u32) -> Result<u32> {
    match int_from_env(key)? {
        Some(value) => u32::try_from(value)
            .ok()
            .filter(|cap| *cap > 0)
            .ok_or_else(|| anyhow!("{key} must be a positive 32-bit value, got {value}")),
        None => Ok(default),
    }
}

fn int_from_env(key: &str) -> Result<Option<i64>> {
    match env::var(key) {
        Ok(value) => {
            let parsed = value
                .trim()
                .parse::<i64>()
                .map_err(|err| anyhow!("Invalid value '{value}' for {key}: {err}"))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

fn bool_from_env(key: &str) -> Option<bool> {
    env::var(key).ok().map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|item| {
            let name = item.trim();
            if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
