// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Grant lookup with on-demand access token refresh.
//!
//! A grant whose access token expires within [`REFRESH_MARGIN_SECS`] is refreshed
//! with the provider and persisted before it is returned. Concurrent lookups
//! of the same user share one execution, so a burst of requests costs at
//! most one refresh.

use super::google::TokenProvider;
use super::user::UserService;
use crate::context::RequestContext;
use crate::error::AppError;
use crate::models::{UserAccess, BEARER};
use crate::singleflight::RequestDeduplicator;
use crate::time_utils::{format_utc_rfc3339, parse_expiry};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Refresh tokens expiring within this many seconds.
pub const REFRESH_MARGIN_SECS: i64 = 120;

/// Budget for persisting a refreshed grant.
pub const UPDATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves grants to other services, refreshing stale access tokens.
#[derive(Clone)]
pub struct UserSelectHandler {
    service: UserService,
    provider: Arc<dyn TokenProvider>,
    group: Arc<RequestDeduplicator<UserAccess>>,
}

impl UserSelectHandler {
    pub fn new(
        service: UserService,
        provider: Arc<dyn TokenProvider>,
        group: Arc<RequestDeduplicator<UserAccess>>,
    ) -> Self {
        Self {
            service,
            provider,
            group,
        }
    }

    /// Current grant for `uid` with a usable access token.
    ///
    /// Callers that join an in-flight lookup receive its result, including
    /// its error; the first caller's deadline governs the shared work.
    pub async fn get_user(&self, ctx: &RequestContext, uid: &str) -> Result<UserAccess, AppError> {
        let key = uid.trim().to_string();
        let id = key.clone();
        let service = self.service.clone();
        let provider = self.provider.clone();
        let ctx = *ctx;

        self.group
            .run(&key, move || async move {
                refresh_if_expiring(&service, provider.as_ref(), &ctx, &id).await
            })
            .await
    }
}

async fn refresh_if_expiring(
    service: &UserService,
    provider: &dyn TokenProvider,
    ctx: &RequestContext,
    id: &str,
) -> Result<UserAccess, AppError> {
    let user = service.get_user(ctx, id).await?;
    let expiry = parse_expiry(&user.expiry)?;

    if Utc::now() < expiry - chrono::Duration::seconds(REFRESH_MARGIN_SECS) {
        return Ok(user);
    }

    tracing::info!(user_id = %id, expiry = %user.expiry, "Access token expiring, refreshing");

    let token = ctx
        .run(provider.refresh(&user.refresh_token))
        .await
        .map_err(|e| {
            tracing::warn!(user_id = %id, error = %e, "Token refresh failed");
            e
        })?;

    let refreshed = UserAccess {
        id: user.id.clone(),
        expiry: format_utc_rfc3339(token.expiry_from(Utc::now())),
        access_token: token.access_token,
        // Google only returns a refresh token when it rotates one
        refresh_token: token.refresh_token.unwrap_or(user.refresh_token),
        token_type: BEARER.to_string(),
        scope: user.scope,
    };

    let update_ctx = ctx.child(UPDATE_TIMEOUT);
    service.update_user(&update_ctx, &refreshed).await
}
