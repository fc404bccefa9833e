// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory grant store.

use super::{normalize_id, validated};
use crate::context::RequestContext;
use crate::error::AppError;
use crate::models::UserAccess;
use dashmap::DashMap;
use std::sync::Arc;

/// Grants serialized as JSON in a shared map.
///
/// Writes to one key are last-writer-wins; there is no read-check-then-write.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    kvs: Arc<DashMap<String, String>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.kvs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kvs.is_empty()
    }

    fn save(&self, user: &UserAccess) -> Result<(), AppError> {
        let buffer = serde_json::to_string(user)
            .map_err(|e| AppError::Database(format!("Failed to encode user: {}", e)))?;
        self.kvs.insert(user.id.clone(), buffer);
        Ok(())
    }

    pub async fn insert_user(&self, ctx: &RequestContext, user: &UserAccess) -> Result<(), AppError> {
        ctx.check()?;
        let user = validated(user)?;
        self.save(&user)
    }

    pub async fn select_user_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<UserAccess, AppError> {
        ctx.check()?;
        let id = normalize_id(id)?;

        let buffer = self
            .kvs
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;

        serde_json::from_str(&buffer)
            .map_err(|e| AppError::Database(format!("Failed to decode user {}: {}", id, e)))
    }

    pub async fn upsert_user(
        &self,
        ctx: &RequestContext,
        user: &UserAccess,
    ) -> Result<UserAccess, AppError> {
        ctx.check()?;
        let user = validated(user)?;
        self.save(&user)?;
        Ok(user)
    }

    pub async fn delete_user_by_id(&self, ctx: &RequestContext, id: &str) -> Result<(), AppError> {
        ctx.check()?;
        let id = normalize_id(id)?;

        self.kvs
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("User {}", id)))
    }
}
