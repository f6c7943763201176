// Shared between the integration test binaries; not every helper is used
// by every binary.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::Request;
use axum::response::Response;
use common_auth::{ExternalVerifier, KeyCache};
use http_body_util::BodyExt;
use serde_json::Value;

use campus_api::app::AppState;
use campus_api::config::AppConfig;
use campus_api::credentials::CredentialStore;
use campus_api::profile::{ProfileStore, ProfileSync, RegionStore};
use campus_api::reset::ResetLedger;
use campus_api::tokens::{LocalVerifier, TokenSigner};

pub const ISSUER: &str = "https://idp.test";
pub const AUDIENCE: &str = "https://campus.test/api";
pub const NAMESPACE: &str = "https://campus.test";

pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: "integration-test-secret".to_string(),
        token_expire_minutes: 60,
        cookie_expire_days: 1,
        cookie_secure: false,
        reset_token_expire_minutes: 10,
        external_issuer: ISSUER.to_string(),
        external_audience: AUDIENCE.to_string(),
        claim_namespace: Some(NAMESPACE.to_string()),
        jwks_url: None,
        jwks_requests_per_minute: 5,
        region_names: vec!["North".to_string(), "Central".to_string()],
    }
}

pub async fn test_state_with_cache(cache: KeyCache) -> AppState {
    let config = Arc::new(test_config());

    let credentials = CredentialStore::new();
    let regions = RegionStore::new();
    regions.seed(&config.region_names).await;
    let profile_sync = ProfileSync::new(ProfileStore::new(), regions.clone());
    let reset = ResetLedger::new(credentials.clone(), config.reset_token_expire_minutes);

    let signer = Arc::new(TokenSigner::new(
        &config.jwt_secret,
        config.token_expire_minutes,
    ));
    let local = LocalVerifier::new(signer, credentials.clone());
    let external = Arc::new(ExternalVerifier::new(config.jwt_config(), cache));

    AppState {
        config,
        credentials,
        regions,
        profile_sync,
        reset,
        local,
        external,
    }
}

pub async fn test_state() -> AppState {
    test_state_with_cache(KeyCache::static_only()).await
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

pub fn bearer_json_request(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn read_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
