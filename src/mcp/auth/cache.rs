//! Per-tenant bearer token cache with single-flight fetching.
//!
//! Each tenant key owns one slot. A slot is a `OnceCell` shared by every
//! caller that arrives while it is empty, so concurrent misses for the same
//! tenant collapse into a single upstream fetch. A failed fetch stores
//! nothing: the next waiter runs its own fetch, and a slot nobody filled is
//! dropped from the map.
//!
//! Every token remembers the [`ClientFingerprint`] it was issued to and is
//! only served to callers presenting the same client credentials.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, TimeDelta, Utc};
use oauth2::AccessToken;
use tokio::sync::OnceCell;
use tracing::debug;

use super::credentials::{ClientFingerprint, TenantKey};
use crate::mcp::error::AuthError;

/// Tokens this close to expiry are refetched instead of served.
const REFRESH_SKEW_SECS: i64 = 30;

/// A bearer token obtained for one tenant.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: AccessToken,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    pub const fn new(token: AccessToken) -> Self {
        Self {
            token,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn expiring_in(mut self, seconds: u64) -> Self {
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        self.expires_at =
            TimeDelta::try_seconds(seconds).and_then(|d| Utc::now().checked_add_signed(d));
        self
    }

    /// Tokens without an expiry never go stale on their own.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - TimeDelta::seconds(REFRESH_SKEW_SECS) <= now)
    }
}

/// A token together with the client credentials it was issued to.
#[derive(Debug)]
struct Entry {
    owner: ClientFingerprint,
    token: CachedToken,
}

type Slot = Arc<OnceCell<Entry>>;

#[derive(Debug, Default)]
pub struct TokenCache {
    slots: Mutex<HashMap<TenantKey, Slot>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<TenantKey, Slot>> {
        // The map holds no invariants a panicking holder could break.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, key: &TenantKey) -> Slot {
        Arc::clone(self.slots().entry(key.clone()).or_default())
    }

    /// Swaps out `stale` for a fresh slot unless another caller already did.
    fn replace_stale(&self, key: &TenantKey, stale: &Slot) -> Slot {
        let mut slots = self.slots();
        let current = slots.entry(key.clone()).or_default();
        if Arc::ptr_eq(current, stale) {
            *current = Slot::default();
        }
        Arc::clone(current)
    }

    /// Removes `slot` if it is still registered for `key` and never got a token.
    fn discard_empty(&self, key: &TenantKey, slot: &Slot) {
        let mut slots = self.slots();
        let unused = slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized());
        if unused {
            slots.remove(key);
        }
    }

    /// Returns the cached token for `key`, running `fetch` only on a miss.
    ///
    /// Concurrent callers for the same key and `owner` share one in-flight
    /// `fetch`. A token issued to different client credentials is never
    /// served: the caller fetches with its own credentials, and only a
    /// successful fetch replaces the cached token.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `fetch`; nothing is cached in that case.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &TenantKey,
        owner: &ClientFingerprint,
        fetch: F,
    ) -> Result<CachedToken, AuthError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CachedToken, AuthError>>,
    {
        let mut slot = self.slot(key);

        if let Some(entry) = slot.get() {
            if entry.owner != *owner {
                debug!(tenant = %key, "cached token belongs to other client credentials");
                return self.fetch_for(key, owner, &fetch).await;
            }
            if !entry.token.is_stale(Utc::now()) {
                debug!(tenant = %key, "token cache hit");
                return Ok(entry.token.clone());
            }
            debug!(tenant = %key, "cached token is stale");
            slot = self.replace_stale(key, &slot);
        }

        let initialized = slot
            .get_or_try_init(|| async {
                debug!(tenant = %key, "token cache miss, fetching");
                let token = fetch().await?;
                Ok::<_, AuthError>(Entry {
                    owner: owner.clone(),
                    token,
                })
            })
            .await;

        match initialized {
            Ok(entry) if entry.owner == *owner => Ok(entry.token.clone()),
            // Another caller filled the slot with other credentials while we waited.
            Ok(_) => self.fetch_for(key, owner, &fetch).await,
            Err(err) => {
                self.discard_empty(key, &slot);
                Err(err)
            }
        }
    }

    /// Fetches outside the shared slot and installs the result on success.
    async fn fetch_for<F, Fut>(
        &self,
        key: &TenantKey,
        owner: &ClientFingerprint,
        fetch: &F,
    ) -> Result<CachedToken, AuthError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CachedToken, AuthError>>,
    {
        let token = fetch().await?;
        let entry = Entry {
            owner: owner.clone(),
            token: token.clone(),
        };
        self.slots()
            .insert(key.clone(), Arc::new(OnceCell::new_with(Some(entry))));
        Ok(token)
    }

    #[cfg(test)]
    pub fn get(&self, key: &TenantKey) -> Option<CachedToken> {
        self.slots()
            .get(key)
            .and_then(|slot| slot.get().map(|entry| entry.token.clone()))
            .filter(|cached| !cached.is_stale(Utc::now()))
    }

    #[cfg(test)]
    pub fn insert(&self, key: TenantKey, owner: ClientFingerprint, token: CachedToken) {
        let slot = Arc::new(OnceCell::new_with(Some(Entry { owner, token })));
        self.slots().insert(key, slot);
    }

    /// Drops the token of `key` if it is still `rejected`. A token another
    /// caller has refreshed in the meantime is kept. Returns whether anything
    /// was removed.
    pub fn invalidate(&self, key: &TenantKey, rejected: &AccessToken) -> bool {
        let mut slots = self.slots();
        let matches = slots
            .get(key)
            .and_then(|slot| slot.get())
            .is_some_and(|entry| entry.token.token.secret() == rejected.secret());
        if matches {
            slots.remove(key);
        }
        matches
    }

    /// Drops every cached token.
    pub fn clear(&self) {
        self.slots().clear();
    }

    /// Number of tenants holding a token.
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tenant keys with a slot, filled or not.
    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.slots().len()
    }
}
