// Content-addressed, TTL-scoped store for raw fetch results.
//
// Entries are JSON envelopes carrying their own expiry. Bypass mode makes
// every lookup behave as a miss without deleting anything, so a failed
// refetch can still fall back to the previous entry.

mod clock;
mod key;
mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use key::CacheKey;
pub use storage::{CacheStorage, FsStorage, MemoryStorage};

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use devsignal_common::{FetchError, Identity, RawResult, SourcePayload, SourceTag, TtlClass};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;

/// On-disk form of one entry. Self-contained: no index file is needed to read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEnvelope {
    key: String,
    source: SourceTag,
    ttl_class: TtlClass,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    payload: SourcePayload,
}

impl CacheEnvelope {
    fn into_raw(self) -> RawResult {
        RawResult {
            source: self.source,
            payload: self.payload,
            fetched_at: self.fetched_at,
            ttl_class: self.ttl_class,
        }
    }
}

/// One fetch in progress. The leader holds the lock while fetching and leaves
/// its outcome behind for everyone queued on it.
type Flight = tokio::sync::Mutex<Option<std::result::Result<RawResult, FetchError>>>;

enum Lookup {
    Fresh(RawResult),
    Stale(RawResult),
    Miss,
}

pub struct CacheStore {
    storage: Arc<dyn CacheStorage>,
    clock: Arc<dyn Clock>,
    bypass: bool,
    /// Fetches in progress, by key digest.
    inflight: Mutex<HashMap<String, Arc<Flight>>>,
    /// Results produced by this store during the run. Fresh even under bypass.
    refreshed: Mutex<HashMap<String, (Identity, RawResult)>>,
}

impl CacheStore {
    pub fn new(storage: Arc<dyn CacheStorage>, clock: Arc<dyn Clock>, bypass: bool) -> Self {
        Self {
            storage,
            clock,
            bypass,
            inflight: Mutex::new(HashMap::new()),
            refreshed: Mutex::new(HashMap::new()),
        }
    }

    pub fn bypass(&self) -> bool {
        self.bypass
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// A fresh entry, or `None`. Expired, bypassed and corrupt entries are all misses.
    pub async fn get(&self, key: &CacheKey) -> Option<RawResult> {
        match self.lookup(key).await {
            Lookup::Fresh(raw) => Some(raw),
            Lookup::Stale(_) | Lookup::Miss => None,
        }
    }

    /// Persist `raw` under `key`. Expiry comes from the entry's TTL class.
    pub async fn put(&self, key: &CacheKey, raw: &RawResult) -> Result<()> {
        let digest = key.digest();
        let envelope = CacheEnvelope {
            key: digest.clone(),
            source: raw.source,
            ttl_class: raw.ttl_class,
            fetched_at: raw.fetched_at,
            expires_at: raw.fetched_at + raw.ttl_class.ttl(),
            payload: raw.payload.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        self.storage.write(key, bytes).await?;
        debug!(key = %key, "Cache entry written");
        Ok(())
    }

    pub async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        let digest = key.digest();
        self.lock_refreshed().remove(&digest);
        self.storage.remove(key).await
    }

    /// Drop every entry for one identity.
    pub async fn purge_identity(&self, identity: &Identity) -> Result<()> {
        self.lock_refreshed().retain(|_, (owner, _)| owner != identity);
        self.storage.purge_identity(identity).await?;
        info!(identity = %identity, "Cache purged");
        Ok(())
    }

    /// Serve `key` from cache when fresh, otherwise run `fetch` and store its payload.
    ///
    /// At most one `fetch` per key runs at a time. Callers that arrive while it
    /// runs receive its outcome, error included, instead of fetching again. If
    /// `fetch` fails with a degradable error and an older entry exists, the
    /// older entry is returned instead.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &CacheKey,
        fetch: F,
    ) -> std::result::Result<RawResult, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<SourcePayload, FetchError>>,
    {
        let digest = key.digest();
        let flight = self.join_flight(&digest);
        let mut outcome = flight.lock().await;

        if let Some(shared) = outcome.as_ref() {
            debug!(key = %key, "Joined in-flight fetch");
            return shared.clone();
        }

        let result = self.resolve(key, &digest, fetch).await;
        *outcome = Some(result.clone());
        drop(outcome);
        self.land_flight(&digest, &flight);
        result
    }

    async fn resolve<F, Fut>(
        &self,
        key: &CacheKey,
        digest: &str,
        fetch: F,
    ) -> std::result::Result<RawResult, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<SourcePayload, FetchError>>,
    {
        let stale = match self.lookup(key).await {
            Lookup::Fresh(raw) => {
                debug!(key = %key, "Cache hit");
                return Ok(raw);
            }
            Lookup::Stale(raw) => Some(raw),
            Lookup::Miss => None,
        };

        match fetch().await {
            Ok(payload) => {
                if payload.source() != key.source() {
                    return Err(FetchError::Parse(format!(
                        "connector returned {} payload for {} key",
                        payload.source(),
                        key.source()
                    )));
                }
                let raw = RawResult::new(payload, self.clock.now());
                if let Err(e) = self.put(key, &raw).await {
                    warn!(key = %key, error = %e, "Failed to persist cache entry");
                }
                self.lock_refreshed()
                    .insert(digest.to_string(), (key.identity().clone(), raw.clone()));
                Ok(raw)
            }
            Err(e) => match stale {
                Some(raw) if e.is_degradable() => {
                    warn!(
                        key = %key,
                        error = %e,
                        fetched_at = %raw.fetched_at,
                        "Fetch failed, serving stale cache entry"
                    );
                    Ok(raw)
                }
                _ => Err(e),
            },
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Lookup {
        let digest = key.digest();
        let produced = self.lock_refreshed().get(&digest).map(|(_, raw)| raw.clone());
        if let Some(raw) = produced {
            if self.clock.now() < raw.fetched_at + raw.ttl_class.ttl() {
                return Lookup::Fresh(raw);
            }
        }

        let bytes = match self.storage.read(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Lookup::Miss,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return Lookup::Miss;
            }
        };

        let envelope: CacheEnvelope = match serde_json::from_slice(&bytes) {
            Ok(env) => env,
            Err(e) => {
                warn!(key = %key, error = %e, "Corrupt cache entry, treating as miss");
                return Lookup::Miss;
            }
        };
        if envelope.key != digest || envelope.source != key.source() {
            warn!(key = %key, "Cache entry does not match its key, treating as miss");
            return Lookup::Miss;
        }

        let expired = self.clock.now() >= envelope.expires_at;
        let raw = envelope.into_raw();
        if expired || self.bypass {
            Lookup::Stale(raw)
        } else {
            Lookup::Fresh(raw)
        }
    }

    /// The flight for `digest`, started if none is running.
    fn join_flight(&self, digest: &str) -> Arc<Flight> {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        inflight
            .entry(digest.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }

    /// Forget a finished flight. Joiners still holding it read its outcome;
    /// later callers start a new one.
    fn land_flight(&self, digest: &str, flight: &Arc<Flight>) {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if inflight.get(digest).is_some_and(|f| Arc::ptr_eq(f, flight)) {
            inflight.remove(digest);
        }
    }

    #[cfg(test)]
    fn flights(&self) -> usize {
        self.inflight.lock().map(|m| m.len()).unwrap_or_default()
    }

    fn lock_refreshed(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Identity, RawResult)>> {
        self.refreshed.lock().unwrap_or_else(|e| e.into_inner())
    }
}
