mod support;

use axum::http::StatusCode;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use common_auth::{JwksFetcher, KeyCache};
use httpmock::prelude::*;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tower::ServiceExt;

use campus_api::app::AppState;
use campus_api::build_router;

const KID: &str = "people-key-1";

struct Idp {
    encoding: EncodingKey,
    jwks_body: Value,
}

fn generate_idp() -> Idp {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
    let public_key = private_key.to_public_key();

    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("private pem");
    // Exercised only through the JWKS document, but keep the pem path
    // honest so a bad key fails here rather than mid-test.
    let _ = public_key.to_pkcs1_pem(LineEnding::LF).expect("public pem");

    let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key");
    let jwks_body = json!({
        "keys": [{
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "kid": KID,
            "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }]
    });

    Idp {
        encoding,
        jwks_body,
    }
}

fn external_token(idp: &Idp, subject: &str, regions: &[&str]) -> String {
    let now = Utc::now().timestamp();
    let payload = json!({
        "sub": subject,
        "iss": support::ISSUER,
        "aud": support::AUDIENCE,
        "iat": now,
        "exp": now + 600,
        "https://campus.test/username": subject.replace('|', "-"),
        "https://campus.test/role": "student",
        "https://campus.test/regions": regions,
        "given_name": "Ada",
        "family_name": "Lovelace",
        "email": "ada@example.edu",
    });

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(&header, &payload, &idp.encoding).expect("sign token")
}

async fn state_with_jwks(server: &MockServer) -> AppState {
    let fetcher = JwksFetcher::new(server.url("/.well-known/jwks.json"));
    support::test_state_with_cache(KeyCache::new(fetcher, 5)).await
}

#[tokio::test]
async fn self_read_creates_profile_from_claims() {
    let idp = generate_idp();
    let server = MockServer::start_async().await;
    let jwks = server
        .mock_async(|when, then| {
            when.method(GET).path("/.well-known/jwks.json");
            then.status(200).json_body(idp.jwks_body.clone());
        })
        .await;

    let state = state_with_jwks(&server).await;
    let app = build_router(state);
    let token = external_token(&idp, "auth0|person-1", &["North", "Atlantis"]);

    let response = app
        .clone()
        .oneshot(support::bearer_request(
            "GET",
            "/api/v2/people/auth0%7Cperson-1",
            &token,
        ))
        .await
        .expect("self read");
    assert_eq!(response.status(), StatusCode::OK);
    let body = support::read_json(response).await;
    assert_eq!(body["id"], "auth0|person-1");
    assert_eq!(body["username"], "auth0-person-1");
    assert_eq!(body["classification"], "student");
    assert_eq!(body["given_name"], "Ada");
    // "Atlantis" is not a seeded region, so only one id comes back.
    assert_eq!(body["regions"].as_array().expect("regions").len(), 1);
    let created_at = body["created_at"].clone();

    // A second read with the same claims must not rewrite the record.
    let response = app
        .oneshot(support::bearer_request(
            "GET",
            "/api/v2/people/auth0%7Cperson-1",
            &token,
        ))
        .await
        .expect("second self read");
    assert_eq!(response.status(), StatusCode::OK);
    let body = support::read_json(response).await;
    assert_eq!(body["created_at"], created_at);
    assert_eq!(body["updated_at"], created_at);

    // Both requests share one key, resolved with a single outbound fetch.
    jwks.assert_hits_async(1).await;
}

#[tokio::test]
async fn first_read_with_no_recognized_region_creates_nothing() {
    let idp = generate_idp();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/.well-known/jwks.json");
            then.status(200).json_body(idp.jwks_body.clone());
        })
        .await;

    let state = state_with_jwks(&server).await;
    let app = build_router(state);
    let token = external_token(&idp, "auth0|person-9", &["Atlantis"]);

    let response = app
        .clone()
        .oneshot(support::bearer_request(
            "GET",
            "/api/v2/people/auth0%7Cperson-9",
            &token,
        ))
        .await
        .expect("self read");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Once a recognized region shows up, creation succeeds and the record
    // carries a non-empty membership.
    let token = external_token(&idp, "auth0|person-9", &["Atlantis", "North"]);
    let response = app
        .oneshot(support::bearer_request(
            "GET",
            "/api/v2/people/auth0%7Cperson-9",
            &token,
        ))
        .await
        .expect("retry self read");
    assert_eq!(response.status(), StatusCode::OK);
    let body = support::read_json(response).await;
    assert_eq!(body["regions"].as_array().expect("regions").len(), 1);
}

#[tokio::test]
async fn reading_someone_else_serves_the_store_or_404s() {
    let idp = generate_idp();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/.well-known/jwks.json");
            then.status(200).json_body(idp.jwks_body.clone());
        })
        .await;

    let state = state_with_jwks(&server).await;
    let app = build_router(state);

    // person-2 has never been synced.
    let token = external_token(&idp, "auth0|person-1", &["North"]);
    let response = app
        .clone()
        .oneshot(support::bearer_request(
            "GET",
            "/api/v2/people/auth0%7Cperson-2",
            &token,
        ))
        .await
        .expect("foreign read");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // After person-2 reads themselves, person-1 can see the stored record.
    let other_token = external_token(&idp, "auth0|person-2", &["Central"]);
    let response = app
        .clone()
        .oneshot(support::bearer_request(
            "GET",
            "/api/v2/people/auth0%7Cperson-2",
            &other_token,
        ))
        .await
        .expect("person-2 self read");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(support::bearer_request(
            "GET",
            "/api/v2/people/auth0%7Cperson-2",
            &token,
        ))
        .await
        .expect("foreign read after sync");
    assert_eq!(response.status(), StatusCode::OK);
    let body = support::read_json(response).await;
    assert_eq!(body["id"], "auth0|person-2");
}

#[tokio::test]
async fn people_route_rejects_missing_and_forged_tokens() {
    let idp = generate_idp();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/.well-known/jwks.json");
            then.status(200).json_body(idp.jwks_body.clone());
        })
        .await;

    let state = state_with_jwks(&server).await;
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/api/v2/people/auth0%7Cperson-1")
                .body(axum::body::Body::empty())
                .expect("request"),
        )
        .await
        .expect("no token");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = support::read_json(response).await;
    assert_eq!(body["message"], "Not authorized to access this route");

    // Strip the signature and claim alg none.
    let genuine = external_token(&idp, "auth0|person-1", &["North"]);
    let payload = genuine.split('.').nth(1).expect("payload").to_string();
    let header = URL_SAFE_NO_PAD.encode(format!(r#"{{"alg":"none","typ":"JWT","kid":"{KID}"}}"#));
    let forged = format!("{header}.{payload}.");

    let response = app
        .clone()
        .oneshot(support::bearer_request(
            "GET",
            "/api/v2/people/auth0%7Cperson-1",
            &forged,
        ))
        .await
        .expect("forged token");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A locally-issued HS256 token has no business on the v2 surface.
    let response = app
        .oneshot(support::bearer_request(
            "GET",
            "/api/v2/people/auth0%7Cperson-1",
            "not-even-a-jwt",
        ))
        .await
        .expect("garbage token");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn jwks_failure_fails_closed() {
    let idp = generate_idp();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/.well-known/jwks.json");
            then.status(502);
        })
        .await;

    let state = state_with_jwks(&server).await;
    let app = build_router(state);
    let token = external_token(&idp, "auth0|person-1", &["North"]);

    let response = app
        .oneshot(support::bearer_request(
            "GET",
            "/api/v2/people/auth0%7Cperson-1",
            &token,
        ))
        .await
        .expect("jwks down");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = support::read_json(response).await;
    assert_eq!(body["message"], "Not authorized to access this route");
}
