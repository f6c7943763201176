use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common_auth::{ExternalClaims, Role};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no claimed region resolved to a known region")]
    RegionResolution,
}

/// Region: a translation target for claim-asserted region names only.
/// Region CRUD lives elsewhere; this subsystem just resolves names to ids.
#[derive(Debug, Clone, Serialize)]
pub struct Region {
    pub id: Uuid,
    pub name: String,
}

#[derive(Clone, Default)]
pub struct RegionStore {
    inner: Arc<RwLock<HashMap<Uuid, Region>>>,
}

impl RegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert by unique name; an existing region with the same name wins.
    pub async fn insert(&self, name: &str) -> Region {
        let mut guard = self.inner.write().await;
        if let Some(existing) = guard.values().find(|region| region.name == name) {
            return existing.clone();
        }
        let region = Region {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        guard.insert(region.id, region.clone());
        region
    }

    pub async fn seed<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.insert(name.as_ref()).await;
        }
    }

    /// Translate claim-asserted names into internal ids. Names the store
    /// does not know are dropped, not errored: the region list may
    /// legitimately lag provider-side configuration.
    pub async fn resolve_names(&self, names: &[String]) -> Vec<Uuid> {
        let guard = self.inner.read().await;
        names
            .iter()
            .filter_map(|name| {
                guard
                    .values()
                    .find(|region| &region.name == name)
                    .map(|region| region.id)
            })
            .collect()
    }
}

/// Locally-owned profile record, keyed by the external identity's stable
/// subject id. Externally-sourced fields are overwritten on sync; anything
/// locally owned (timestamps today) is preserved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: String,
    pub given_name: String,
    pub family_name: String,
    pub username: String,
    pub email: Option<String>,
    pub classification: Role,
    pub regions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct ProfileStore {
    inner: Arc<RwLock<HashMap<String, Profile>>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Profile> {
        let guard = self.inner.read().await;
        guard.get(id).cloned()
    }
}

/// Reconciles a verified external identity's claims into the profile store.
/// Invoked opportunistically when a caller reads their own profile, never
/// as a blanket sync.
#[derive(Clone)]
pub struct ProfileSync {
    profiles: ProfileStore,
    regions: RegionStore,
}

impl ProfileSync {
    pub fn new(profiles: ProfileStore, regions: RegionStore) -> Self {
        Self { profiles, regions }
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    /// Idempotent upsert keyed by subject id. Only the externally-sourced
    /// field subset is touched; a sync carrying identical claims leaves the
    /// stored profile byte-for-byte unchanged.
    ///
    /// Every profile holds a non-empty region set. On update, a claim set
    /// whose names all fail to resolve keeps the previous membership; on
    /// first creation there is no previous membership to keep, so at least
    /// one claimed name must resolve or the sync fails.
    pub async fn sync(&self, claims: &ExternalClaims) -> Result<Profile, SyncError> {
        let resolved = self.regions.resolve_names(&claims.regions).await;

        let mut guard = self.profiles.inner.write().await;
        let now = Utc::now();
        match guard.get_mut(&claims.subject) {
            Some(existing) => {
                // Keep previous membership when every claimed name was
                // unknown, so provider-side lag cannot empty the set.
                let regions = if resolved.is_empty() {
                    existing.regions.clone()
                } else {
                    resolved
                };
                let unchanged = existing.given_name
                    == claims.given_name.clone().unwrap_or_default()
                    && existing.family_name == claims.family_name.clone().unwrap_or_default()
                    && existing.username == claims.username
                    && existing.email == claims.email
                    && existing.classification == claims.role
                    && existing.regions == regions;
                if !unchanged {
                    existing.given_name = claims.given_name.clone().unwrap_or_default();
                    existing.family_name = claims.family_name.clone().unwrap_or_default();
                    existing.username = claims.username.clone();
                    existing.email = claims.email.clone();
                    existing.classification = claims.role;
                    existing.regions = regions;
                    existing.updated_at = now;
                    debug!(subject = %claims.subject, "profile refreshed from claims");
                }
                Ok(existing.clone())
            }
            None => {
                if resolved.is_empty() {
                    return Err(SyncError::RegionResolution);
                }
                let profile = Profile {
                    id: claims.subject.clone(),
                    given_name: claims.given_name.clone().unwrap_or_default(),
                    family_name: claims.family_name.clone().unwrap_or_default(),
                    username: claims.username.clone(),
                    email: claims.email.clone(),
                    classification: claims.role,
                    regions: resolved,
                    created_at: now,
                    updated_at: now,
                };
                guard.insert(profile.id.clone(), profile.clone());
                debug!(subject = %claims.subject, "profile created from claims");
                Ok(profile)
            }
        }
    }
}
