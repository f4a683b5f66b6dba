// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Security
//!
//! - JWKS is fetched over HTTPS from the configured issuer only
//! - The key set is cached as a whole with a configurable TTL
//! - A fetch failure propagates; the stale set is NOT served
//!
//! ## Concurrency
//!
//! The cache entry is a single value behind an `RwLock`: readers clone the
//! set out under the read lock, writers replace the whole entry. Concurrent
//! requests racing on an expired cache may each trigger a refetch; that
//! duplicate work is bounded and harmless. No reader can observe a
//! half-written key set or a set without its timestamp.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use tokio::sync::RwLock;
use url::Url;

use super::error::AuthError;

/// Default key set cache TTL (1 hour).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Timeout for JWKS HTTP fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Cached key set with its fetch timestamp. Replaced wholesale, never
/// mutated in place.
struct CacheEntry {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Time-bounded cache for the identity provider's signing keys.
///
/// Key rotation is infrequent and a full refetch is cheap, so the whole
/// set shares one TTL rather than tracking per-key freshness.
#[derive(Clone)]
pub struct KeySetCache {
    /// JWKS endpoint URL.
    jwks_url: Url,
    /// Cache TTL.
    cache_ttl: Duration,
    /// Cached key set.
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// HTTP client.
    client: reqwest::Client,
}

impl KeySetCache {
    /// Create a new key set cache for the given JWKS endpoint.
    pub fn new(jwks_url: Url) -> Self {
        Self {
            jwks_url,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &Url {
        &self.jwks_url
    }

    /// Get the current key set, fetching from the remote endpoint if the
    /// cached set is missing or older than the TTL.
    ///
    /// A fetch failure is returned to the caller; the expired set is not
    /// served in its place.
    pub async fn get_keys(&self) -> Result<JwkSet, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(entry.keys.clone());
                }
            }
        }

        let keys = self.fetch_keys().await?;

        {
            let mut cache = self.cache.write().await;
            *cache = Some(CacheEntry {
                keys: keys.clone(),
                fetched_at: Instant::now(),
            });
        }

        Ok(keys)
    }

    /// Unconditionally clear the cached key set, forcing the next
    /// [`get_keys`](Self::get_keys) call to refetch.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }

    /// Force refresh the cached key set.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let keys = self.fetch_keys().await?;
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    /// Check if a key set is currently cached and within its TTL.
    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        if let Some(entry) = &*cache {
            entry.fetched_at.elapsed() < self.cache_ttl
        } else {
            false
        }
    }

    /// Fetch the key set from the endpoint.
    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(self.jwks_url.clone())
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetch(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        Ok(keys)
    }
}
