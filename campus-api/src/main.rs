use std::net::SocketAddr;
use std::sync::Arc;

use common_auth::{ExternalVerifier, JwksFetcher, KeyCache};
use tokio::net::TcpListener;
use tracing::{info, warn};

use campus_api::app::AppState;
use campus_api::build_router;
use campus_api::config::load_config;
use campus_api::credentials::CredentialStore;
use campus_api::profile::{ProfileStore, ProfileSync, RegionStore};
use campus_api::reset::ResetLedger;
use campus_api::tokens::{LocalVerifier, TokenSigner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = Arc::new(load_config()?);

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

    let key_cache = KeyCache::new(
        JwksFetcher::new(config.jwks_url()),
        config.jwks_requests_per_minute,
    );
    // Warm the cache; a cold or unreachable key set is not fatal at startup
    // since an unknown kid triggers a refetch on demand.
    match key_cache.refresh().await {
        Ok(count) => info!(count, "JWKS cache warmed"),
        Err(err) => warn!(error = %err, "JWKS warm-up fetch failed"),
    }
    let external = Arc::new(ExternalVerifier::new(config.jwt_config(), key_cache));

    let state = AppState {
        config: config.clone(),
        credentials,
        regions,
        profile_sync,
        reset,
        local,
        external,
    };

    let app = build_router(state);

    let ip: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((ip, config.port));
    info!(%addr, "starting campus-api");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
