//! Persistence layer for encrypted user grants.
//!
//! Backends are selected by [`PersistenceKind`] and dispatched through the
//! [`TokenStore`] enum; every variant satisfies the same contract.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreUserStore;
pub use memory::MemoryUserStore;

use crate::context::RequestContext;
use crate::error::AppError;
use crate::models::UserAccess;

/// Collection names as constants.
pub mod collections {
    pub const USER_ACCESS: &str = "user_access";
}

/// Which backend holds user grants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistenceKind {
    /// Process-local map; single instance and tests only.
    #[default]
    Memory,
    Firestore,
}

impl std::str::FromStr for PersistenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Ok(PersistenceKind::Memory),
            "firestore" => Ok(PersistenceKind::Firestore),
            other => Err(format!("unknown persistence type '{}'", other)),
        }
    }
}

/// Durable home of encrypted grants, keyed by user ID.
#[derive(Clone)]
pub enum TokenStore {
    Memory(MemoryUserStore),
    Firestore(FirestoreUserStore),
}

impl TokenStore {
    /// Connect the backend named by `kind`.
    pub async fn connect(kind: PersistenceKind, project_id: &str) -> Result<Self, AppError> {
        match kind {
            PersistenceKind::Memory => {
                tracing::warn!("Using in-memory token store; grants are lost on restart");
                Ok(TokenStore::Memory(MemoryUserStore::new()))
            }
            PersistenceKind::Firestore => Ok(TokenStore::Firestore(
                FirestoreUserStore::new(project_id).await?,
            )),
        }
    }

    /// Create or overwrite the record for `user.id`.
    pub async fn insert_user(&self, ctx: &RequestContext, user: &UserAccess) -> Result<(), AppError> {
        match self {
            TokenStore::Memory(store) => store.insert_user(ctx, user).await,
            TokenStore::Firestore(store) => store.insert_user(ctx, user).await,
        }
    }

    pub async fn select_user_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<UserAccess, AppError> {
        match self {
            TokenStore::Memory(store) => store.select_user_by_id(ctx, id).await,
            TokenStore::Firestore(store) => store.select_user_by_id(ctx, id).await,
        }
    }

    /// Create or update, returning the stored value.
    pub async fn upsert_user(
        &self,
        ctx: &RequestContext,
        user: &UserAccess,
    ) -> Result<UserAccess, AppError> {
        match self {
            TokenStore::Memory(store) => store.upsert_user(ctx, user).await,
            TokenStore::Firestore(store) => store.upsert_user(ctx, user).await,
        }
    }

    pub async fn delete_user_by_id(&self, ctx: &RequestContext, id: &str) -> Result<(), AppError> {
        match self {
            TokenStore::Memory(store) => store.delete_user_by_id(ctx, id).await,
            TokenStore::Firestore(store) => store.delete_user_by_id(ctx, id).await,
        }
    }
}

/// Trim `id`, rejecting blank values.
pub(crate) fn normalize_id(id: &str) -> Result<&str, AppError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::InvalidParameter {
            name: "UID",
            reason: "Should not be blank",
        });
    }
    Ok(id)
}

/// Validated copy of `user`, ready to persist.
pub(crate) fn validated(user: &UserAccess) -> Result<UserAccess, AppError> {
    let mut user = user.clone();
    user.validate()?;
    Ok(user)
}
