use std::sync::Arc;

use axum::extract::FromRef;
use common_auth::ExternalVerifier;

use crate::config::AppConfig;
use crate::credentials::CredentialStore;
use crate::profile::{ProfileSync, RegionStore};
use crate::reset::ResetLedger;
use crate::tokens::LocalVerifier;

/// Shared application state, composed once at startup. The external
/// verifier (and its key cache) is injected here rather than living as
/// ambient process state, so tests can wire a fake key source.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub credentials: CredentialStore,
    pub regions: RegionStore,
    pub profile_sync: ProfileSync,
    pub reset: ResetLedger,
    pub local: LocalVerifier,
    pub external: Arc<ExternalVerifier>,
}

impl FromRef<AppState> for Arc<ExternalVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.external.clone()
    }
}
