pub mod app;
pub mod auth_handlers;
pub mod config;
pub mod credentials;
pub mod error;
pub mod people_handlers;
pub mod profile;
pub mod reset;
pub mod session;
pub mod tokens;

use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use app::AppState;

async fn health() -> &'static str {
    "ok"
}

/// Route table. Each route is statically bound to exactly one verification
/// path: `/api/v1/auth` uses the local shared-secret tokens, `/api/v2`
/// requires externally-issued JWKS-verified tokens.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/v1/auth/register", post(auth_handlers::register))
        .route("/api/v1/auth/login", post(auth_handlers::login))
        .route("/api/v1/auth/logout", post(auth_handlers::logout))
        .route(
            "/api/v1/auth/details",
            get(auth_handlers::get_details).patch(auth_handlers::update_details),
        )
        .route("/api/v1/auth/role", patch(auth_handlers::update_role))
        .route(
            "/api/v1/auth/password",
            post(auth_handlers::forgot_password).patch(auth_handlers::update_password),
        )
        .route(
            "/api/v1/auth/password/:reset_token",
            put(auth_handlers::reset_password),
        )
        .route("/api/v2/people/:id", get(people_handlers::get_person))
        .with_state(state)
        .layer(CorsLayer::permissive())
}
