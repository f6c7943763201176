use axum::extract::{Path, State};
use axum::Json;
use common_auth::{ensure_role, AuthContext, ROLE_ANY};

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::profile::Profile;

/// Profile read on the external-token path. When the verified subject is
/// reading their own profile the synchronizer runs first, so the record
/// reflects the claims that just arrived; any other read is served from
/// the store as-is.
pub async fn get_person(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Profile>> {
    ensure_role(&ctx.identity(), ROLE_ANY)?;

    if ctx.claims.subject == id {
        let profile = state.profile_sync.sync(&ctx.claims).await?;
        return Ok(Json(profile));
    }

    state
        .profile_sync
        .profiles()
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(ApiError::not_found)
}
