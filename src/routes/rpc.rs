// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Internal RPC endpoints used by the gateway and editor services.
//!
//! Every call runs under a fresh [`RequestContext`] bounded by the
//! configured request timeout.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::Result;
use crate::models::UserAccess;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/users/select", post(select_user))
        .route("/rpc/users/insert", post(insert_user))
        .route("/rpc/users/delete", post(delete_user))
}

/// Body of select and delete calls.
#[derive(Debug, Deserialize)]
pub struct UserIdRequest {
    pub id: String,
}

/// Grant with a fresh access token.
async fn select_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserIdRequest>,
) -> Result<Json<UserAccess>> {
    let ctx = RequestContext::with_timeout(state.config.request_timeout);

    let user = state
        .select_handler
        .get_user(&ctx, &req.id)
        .await
        .map_err(|e| {
            tracing::warn!(user_id = %req.id.trim(), error = %e, "Select user failed");
            e
        })?;

    Ok(Json(user))
}

/// Create or replace a grant.
async fn insert_user(
    State(state): State<Arc<AppState>>,
    Json(user): Json<UserAccess>,
) -> Result<Json<UserAccess>> {
    let ctx = RequestContext::with_timeout(state.config.request_timeout);
    let user = state.user_service.update_user(&ctx, &user).await?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserIdRequest>,
) -> Result<StatusCode> {
    let ctx = RequestContext::with_timeout(state.config.request_timeout);
    state.user_service.delete_user(&ctx, &req.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
