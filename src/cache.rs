// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Short-lived read-through cache of encrypted grants.
//!
//! Entries carry an absolute expiry; an expired entry reads as a miss and is
//! evicted on the spot. Callers treat every cache error as soft.

use crate::context::RequestContext;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default number of entries held by the memory cache.
pub const DEFAULT_CACHE_SIZE: usize = 10_000;

/// Which cache backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheKind {
    #[default]
    Memory,
    /// Every read misses; writes are dropped.
    Disabled,
}

impl std::str::FromStr for CacheKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Ok(CacheKind::Memory),
            "disabled" | "none" => Ok(CacheKind::Disabled),
            other => Err(format!("unknown cache type '{}'", other)),
        }
    }
}

/// Cache of serialized grants keyed by user ID.
#[derive(Clone)]
pub enum UserCache {
    Memory(MemoryCache),
    Disabled,
}

impl UserCache {
    pub fn new(kind: CacheKind, capacity: usize) -> Self {
        match kind {
            CacheKind::Memory => UserCache::Memory(MemoryCache::new(capacity)),
            CacheKind::Disabled => UserCache::Disabled,
        }
    }

    /// Cached payload and the time it was stored, if present and fresh.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        key: &str,
    ) -> Result<Option<(String, DateTime<Utc>)>, AppError> {
        ctx.check()?;
        match self {
            UserCache::Memory(cache) => Ok(cache.get(key)),
            UserCache::Disabled => Ok(None),
        }
    }

    pub async fn put(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), AppError> {
        ctx.check()?;
        match self {
            UserCache::Memory(cache) => cache.put(key, value, ttl),
            UserCache::Disabled => Ok(()),
        }
    }

    pub async fn delete(&self, ctx: &RequestContext, key: &str) -> Result<(), AppError> {
        ctx.check()?;
        match self {
            UserCache::Memory(cache) => {
                cache.delete(key);
                Ok(())
            }
            UserCache::Disabled => Ok(()),
        }
    }

    /// Whether a fresh entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        match self {
            UserCache::Memory(cache) => cache.get(key).is_some(),
            UserCache::Disabled => false,
        }
    }
}

#[derive(Clone)]
struct CacheEntry {
    payload: String,
    stored_at: DateTime<Utc>,
    expires_at: Instant,
}

/// Bounded in-process cache with per-entry TTL.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    capacity: usize,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get(&self, key: &str) -> Option<(String, DateTime<Utc>)> {
        let now = Instant::now();
        let hit = self.entries.get(key).map(|entry| {
            (
                entry.expires_at > now,
                entry.payload.clone(),
                entry.stored_at,
            )
        });

        match hit {
            Some((true, payload, stored_at)) => Some((payload, stored_at)),
            Some((false, _, _)) => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError> {
        if ttl.is_zero() {
            return Err(AppError::Cache(format!(
                "Refusing to cache {} with a zero TTL",
                key
            )));
        }

        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            self.make_room();
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                payload: value,
                stored_at: Utc::now(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop expired entries, then the entry closest to expiry if still full.
    fn make_room(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);

        if self.entries.len() < self.capacity {
            return;
        }

        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            tracing::debug!(key = %key, "Cache full, evicting entry closest to expiry");
            self.entries.remove(&key);
        }
    }
}
