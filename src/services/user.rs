// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle service.
//!
//! Composes the store, the cache, and the encryptor. Tokens are encrypted
//! before they reach either backend and decrypted on the way out; the
//! cache holds the encrypted record for a fraction of its remaining life.

use crate::cache::UserCache;
use crate::context::RequestContext;
use crate::crypto::Encryptor;
use crate::db::{normalize_id, TokenStore};
use crate::error::AppError;
use crate::models::UserAccess;
use crate::time_utils::{cache_ttl, parse_expiry};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Budget for deleting a cache entry that must not outlive a failed write.
const CACHE_CLEANUP_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
enum CryptoOp {
    Encrypt,
    Decrypt,
}

/// Create/read/update/delete of user grants with encryption at rest.
#[derive(Clone)]
pub struct UserService {
    store: TokenStore,
    cache: UserCache,
    encryptor: Arc<dyn Encryptor>,
    key: Arc<[u8]>,
}

impl UserService {
    pub fn new(
        store: TokenStore,
        cache: UserCache,
        encryptor: Arc<dyn Encryptor>,
        key: impl AsRef<[u8]>,
    ) -> Self {
        Self {
            store,
            cache,
            encryptor,
            key: Arc::from(key.as_ref()),
        }
    }

    /// Store a new grant.
    pub async fn create_user(&self, ctx: &RequestContext, user: &UserAccess) -> Result<(), AppError> {
        let mut user = user.clone();
        user.validate()?;

        tracing::debug!(user_id = %user.id, "Encrypting tokens for new user");
        let sealed = self.seal(ctx, &user).await?;
        self.store.insert_user(ctx, &sealed).await?;

        // A record cached before this write would shadow it.
        self.discard(&user.id).await;

        tracing::info!(user_id = %user.id, "User grant created");
        Ok(())
    }

    /// Fetch a grant with plaintext tokens, cache first.
    pub async fn get_user(&self, ctx: &RequestContext, uid: &str) -> Result<UserAccess, AppError> {
        let id = normalize_id(uid)?;

        let sealed = match self.cached(ctx, id).await {
            Some(user) => {
                tracing::debug!(user_id = %id, "Cache hit");
                user
            }
            None => {
                let user = self.store.select_user_by_id(ctx, id).await?;
                self.populate(ctx, &user).await;
                user
            }
        };

        let (access_token, refresh_token) = self
            .crypt_pair(
                ctx,
                CryptoOp::Decrypt,
                &sealed.access_token,
                &sealed.refresh_token,
            )
            .await?;

        Ok(sealed.with_tokens(access_token, refresh_token))
    }

    /// Overwrite a grant, refreshing the cache, and return the plaintext record.
    pub async fn update_user(
        &self,
        ctx: &RequestContext,
        user: &UserAccess,
    ) -> Result<UserAccess, AppError> {
        let mut user = user.clone();
        user.validate()?;
        let expiry = parse_expiry(&user.expiry)?;

        let sealed = self.seal(ctx, &user).await?;

        match cache_ttl(expiry, Utc::now()) {
            Some(ttl) => {
                let put = match serde_json::to_string(&sealed) {
                    Ok(payload) => self.cache.put(ctx, &sealed.id, payload, ttl).await,
                    Err(e) => Err(AppError::Cache(format!("Failed to encode user: {}", e))),
                };
                if let Err(e) = put {
                    tracing::warn!(user_id = %user.id, error = %e, "Cache write failed, evicting");
                    self.discard(&user.id).await;
                }
            }
            None => self.discard(&user.id).await,
        }

        if let Err(e) = self.store.upsert_user(ctx, &sealed).await {
            self.discard(&user.id).await;
            return Err(e);
        }

        tracing::info!(user_id = %user.id, "User grant updated");
        Ok(user)
    }

    /// Remove a grant from the cache and the store.
    pub async fn delete_user(&self, ctx: &RequestContext, uid: &str) -> Result<(), AppError> {
        let id = normalize_id(uid)?;

        if self.cache.contains(id) {
            self.evict(ctx, id).await;
        }

        self.store.delete_user_by_id(ctx, id).await?;
        tracing::info!(user_id = %id, "User grant deleted");
        Ok(())
    }

    /// Copy of `user` with both tokens encrypted.
    async fn seal(&self, ctx: &RequestContext, user: &UserAccess) -> Result<UserAccess, AppError> {
        let (access_token, refresh_token) = self
            .crypt_pair(
                ctx,
                CryptoOp::Encrypt,
                &user.access_token,
                &user.refresh_token,
            )
            .await?;
        Ok(user.with_tokens(access_token, refresh_token))
    }

    /// Run `op` on both tokens in parallel, bounded by the request deadline.
    ///
    /// The first failure wins; the sibling result is discarded.
    async fn crypt_pair(
        &self,
        ctx: &RequestContext,
        op: CryptoOp,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<(String, String), AppError> {
        let access = self.crypt(op, access_token.to_string());
        let refresh = self.crypt(op, refresh_token.to_string());

        ctx.run(async { tokio::try_join!(access, refresh) }).await
    }

    async fn crypt(&self, op: CryptoOp, input: String) -> Result<String, AppError> {
        let encryptor = self.encryptor.clone();
        let key = self.key.clone();

        tokio::task::spawn_blocking(move || match op {
            CryptoOp::Encrypt => encryptor.encrypt(&input, &key),
            CryptoOp::Decrypt => encryptor.decrypt(&input, &key),
        })
        .await
        .map_err(|e| AppError::Internal(format!("Crypto task failed: {}", e)))?
    }

    /// Valid encrypted record from the cache, if any. Errors read as a miss.
    async fn cached(&self, ctx: &RequestContext, id: &str) -> Option<UserAccess> {
        let (payload, _) = match self.cache.get(ctx, id).await {
            Ok(Some(hit)) => hit,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(user_id = %id, error = %e, "Cache read failed");
                return None;
            }
        };

        let mut user: UserAccess = match serde_json::from_str(&payload) {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(user_id = %id, error = %e, "Could not decode cached user");
                return None;
            }
        };

        match user.validate() {
            Ok(()) => Some(user),
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "Ignoring invalid cached user");
                None
            }
        }
    }

    /// Best-effort write of a store result into the cache.
    async fn populate(&self, ctx: &RequestContext, user: &UserAccess) {
        let mut user = user.clone();
        if user.validate().is_err() {
            return;
        }

        let ttl = match parse_expiry(&user.expiry) {
            Ok(expiry) => cache_ttl(expiry, Utc::now()),
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Stored expiry unreadable, not caching");
                None
            }
        };
        let Some(ttl) = ttl else { return };

        let result = match serde_json::to_string(&user) {
            Ok(payload) => self.cache.put(ctx, &user.id, payload, ttl).await,
            Err(e) => Err(AppError::Cache(e.to_string())),
        };
        if let Err(e) = result {
            tracing::debug!(user_id = %user.id, error = %e, "Cache populate failed");
        }
    }

    async fn evict(&self, ctx: &RequestContext, id: &str) {
        if let Err(e) = self.cache.delete(ctx, id).await {
            tracing::warn!(user_id = %id, error = %e, "Cache delete failed");
        }
    }

    /// Delete a cache entry under its own deadline.
    ///
    /// Runs after the request deadline may already have passed, so the
    /// entry never outlives a store write that did not land.
    async fn discard(&self, id: &str) {
        let ctx = RequestContext::background().child(CACHE_CLEANUP_TIMEOUT);
        self.evict(&ctx, id).await;
    }
}
