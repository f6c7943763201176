use axum::extract::{Path, State};
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;
use chrono::SecondsFormat;
use common_auth::{ensure_role, Role, ROLE_ADMIN_ONLY};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::AppState;
use crate::credentials::{verify_password, Credential};
use crate::error::{ApiError, ApiResult};
use crate::session::Session;

const COOKIE_NAME: &str = "token";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateDetailsRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let credential = state
        .credentials
        .create(&request.email, request.role, &request.password)
        .await?;
    info!(identifier = %credential.identifier, role = %credential.role, "credential registered");
    token_response(&state, &credential)
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::validation("no email or password provided"));
    }

    let credential = state
        .credentials
        .find_by_identifier(&request.email)
        .await
        .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password(&credential.password_hash, &request.password) {
        return Err(ApiError::invalid_credentials());
    }

    token_response(&state, &credential)
}

pub async fn logout(State(state): State<AppState>, _session: Session) -> impl IntoResponse {
    let cookie = clear_cookie(&state);
    (
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(MessageResponse {
            message: "Logged out",
        }),
    )
}

pub async fn get_details(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<Credential>> {
    let credential = state
        .credentials
        .find_by_id(session.credential.id)
        .await
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(credential))
}

/// Email is the only caller-updatable detail; role and secret have their
/// own gated routes.
pub async fn update_details(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UpdateDetailsRequest>,
) -> ApiResult<Json<Credential>> {
    let credential = state
        .credentials
        .update_identifier(session.credential.id, &request.email)
        .await?;
    Ok(Json(credential))
}

pub async fn update_role(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UpdateRoleRequest>,
) -> ApiResult<Json<Credential>> {
    ensure_role(&session.identity, ROLE_ADMIN_ONLY)?;
    let credential = state
        .credentials
        .update_role(session.credential.id, request.role)
        .await?;
    Ok(Json(credential))
}

pub async fn update_password(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UpdatePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    if !verify_password(&session.credential.password_hash, &request.current_password) {
        return Err(ApiError::invalid_credentials());
    }

    let credential = state
        .credentials
        .set_password(session.credential.id, &request.new_password)
        .await?;
    token_response(&state, &credential)
}

/// Always answers 200 with the same body whether or not the identifier
/// exists, so the endpoint cannot be used to enumerate accounts. The token
/// itself reaches the user out of band.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if let Some(credential) = state.credentials.find_by_identifier(&request.email).await {
        let token = state.reset.request(&credential).await?;
        // Stands in for the outbound delivery channel (email) this
        // subsystem does not own.
        info!(
            identifier = %credential.identifier,
            reset_token = %token,
            "password reset requested"
        );
    }

    Ok(Json(MessageResponse {
        message: "If that account exists, reset instructions have been issued",
    }))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(reset_token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let credential = state.reset.consume(&reset_token, &request.password).await?;
    token_response(&state, &credential)
}

/// Deliver the token both as a JSON body field and as an http-only cookie.
/// The cookie's Max-Age comes from its own configuration knob, decoupled
/// from the token's exp claim.
fn token_response(state: &AppState, credential: &Credential) -> ApiResult<axum::response::Response> {
    let issued = state
        .local
        .signer()
        .issue(credential)
        .map_err(|err| ApiError::internal(err.to_string()))?;

    let max_age = state.config.cookie_expire_days * 24 * 60 * 60;
    let cookie = build_cookie(state, &issued.token, max_age);
    let body = TokenResponse {
        token: issued.token,
        expires_at: issued.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(body)).into_response())
}

fn clear_cookie(state: &AppState) -> String {
    build_cookie(state, "none", 0)
}

fn build_cookie(state: &AppState, value: &str, max_age: i64) -> String {
    let mut cookie = format!("{COOKIE_NAME}={value}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Lax");
    if state.config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}
