/// Runtime configuration for external JWT verification.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Expected issuer claim (iss).
    pub issuer: String,
    /// Expected audience claim (aud).
    pub audience: String,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u32,
    /// URL prefix under which the provider namespaces its custom claims,
    /// e.g. `https://campus.example.org` yields `{prefix}/username`.
    pub claim_namespace: String,
}

impl JwtConfig {
    /// Construct config with sensible defaults (30 second leeway, claim
    /// namespace equal to the issuer).
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let claim_namespace = issuer.trim_end_matches('/').to_string();
        Self {
            issuer,
            audience: audience.into(),
            leeway_seconds: 30,
            claim_namespace,
        }
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    /// Override the custom-claim namespace prefix.
    pub fn with_claim_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.claim_namespace = namespace.into().trim_end_matches('/').to_string();
        self
    }
}
