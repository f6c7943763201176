use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::jwks::JwksFetcher;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Shared, cross-request cache of decoding keys, keyed by kid.
///
/// Entries never expire proactively; an unknown kid triggers a refetch of the
/// whole key set. Concurrent misses queue on one async mutex so only the
/// first waiter performs the outbound fetch and everyone else re-reads the
/// refreshed cache. Outbound fetches are capped per minute to protect the
/// remote endpoint from bursts of unknown-kid lookups.
#[derive(Clone)]
pub struct KeyCache {
    keys: Arc<RwLock<HashMap<String, DecodingKey>>>,
    window: Arc<Mutex<FetchWindow>>,
    fetcher: Option<JwksFetcher>,
    rate_cap: u32,
}

struct FetchWindow {
    recent: VecDeque<Instant>,
}

impl FetchWindow {
    fn admit(&mut self, cap: u32) -> AuthResult<()> {
        let now = Instant::now();
        while let Some(front) = self.recent.front() {
            if now.duration_since(*front) > RATE_WINDOW {
                self.recent.pop_front();
            } else {
                break;
            }
        }
        if self.recent.len() >= cap as usize {
            return Err(AuthError::FetchRateLimited);
        }
        self.recent.push_back(now);
        Ok(())
    }
}

impl KeyCache {
    pub fn new(fetcher: JwksFetcher, rate_cap: u32) -> Self {
        Self {
            keys: Arc::new(RwLock::new(HashMap::new())),
            window: Arc::new(Mutex::new(FetchWindow {
                recent: VecDeque::new(),
            })),
            fetcher: Some(fetcher),
            rate_cap,
        }
    }

    /// Cache with no remote source; keys must be registered explicitly.
    /// Used for deterministic tests and offline composition.
    pub fn static_only() -> Self {
        Self {
            keys: Arc::new(RwLock::new(HashMap::new())),
            window: Arc::new(Mutex::new(FetchWindow {
                recent: VecDeque::new(),
            })),
            fetcher: None,
            rate_cap: 0,
        }
    }

    pub fn insert_key(&self, kid: impl Into<String>, key: DecodingKey) {
        let mut guard = self.keys.write().expect("rwlock poisoned");
        guard.insert(kid.into(), key);
    }

    pub fn insert_rsa_pem(&self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<()> {
        let kid = kid.into();
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|err| AuthError::KeyParse(kid.clone(), err.to_string()))?;
        self.insert_key(kid, key);
        Ok(())
    }

    pub fn get(&self, kid: &str) -> Option<DecodingKey> {
        let guard = self.keys.read().expect("rwlock poisoned");
        guard.get(kid).cloned()
    }

    pub fn contains(&self, kid: &str) -> bool {
        let guard = self.keys.read().expect("rwlock poisoned");
        guard.contains_key(kid)
    }

    pub fn replace_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, DecodingKey)>,
    {
        let mut guard = self.keys.write().expect("rwlock poisoned");
        guard.clear();
        for (kid, key) in entries.into_iter() {
            guard.insert(kid, key);
        }
    }

    /// Look up a key, refetching the key set once if the kid is unknown.
    pub async fn resolve(&self, kid: &str) -> AuthResult<DecodingKey> {
        if let Some(key) = self.get(kid) {
            return Ok(key);
        }

        let fetcher = match &self.fetcher {
            Some(fetcher) => fetcher,
            None => return Err(AuthError::UnknownKeyId(kid.to_string())),
        };

        let mut window = self.window.lock().await;
        // A coalesced waiter may find the key already refreshed.
        if let Some(key) = self.get(kid) {
            return Ok(key);
        }

        window.admit(self.rate_cap)?;
        debug!(kid, url = fetcher.url(), "unknown kid, refetching JWKS");
        let keys = fetcher.fetch().await?;
        if !keys.is_empty() {
            self.replace_all(keys);
        }
        drop(window);

        self.get(kid)
            .ok_or_else(|| AuthError::UnknownKeyId(kid.to_string()))
    }

    /// Unconditional refetch, used to warm the cache at startup. Counts
    /// against the rate cap like any other fetch.
    pub async fn refresh(&self) -> AuthResult<usize> {
        let fetcher = match &self.fetcher {
            Some(fetcher) => fetcher,
            None => return Ok(0),
        };

        let mut window = self.window.lock().await;
        window.admit(self.rate_cap)?;
        let keys = fetcher.fetch().await?;
        let count = keys.len();
        if count > 0 {
            self.replace_all(keys);
        }
        Ok(count)
    }
}
