// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed grant store.
//!
//! Writes and deletes run inside a single-document transaction. The current
//! record is read through the transaction, so the commit fails if another
//! writer changed it in between. Upserts carry `created_at` over.

use super::{collections, normalize_id, validated};
use crate::context::RequestContext;
use crate::error::AppError;
use crate::models::{StoredUserAccess, UserAccess};
use crate::time_utils::format_utc_rfc3339;
use firestore::{FirestoreConsistencySelector, FirestoreDb, FirestoreTransaction};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreUserStore {
    client: Option<FirestoreDb>,
}

impl FirestoreUserStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline store; every operation returns a database error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn find(&self, id: &str) -> Result<Option<StoredUserAccess>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_ACCESS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn begin(client: &FirestoreDb) -> Result<FirestoreTransaction<'_>, AppError> {
        client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))
    }

    /// Read-check-then-write of one grant document.
    async fn save(&self, user: &UserAccess) -> Result<(), AppError> {
        let client = self.get_client()?;
        let mut transaction = Self::begin(client).await?;

        let current = match find_in_transaction(client, &transaction, &user.id).await {
            Ok(current) => current,
            Err(e) => return Err(abort(transaction, e).await),
        };

        let now = format_utc_rfc3339(chrono::Utc::now());
        let created_at = match current {
            Some(doc) => doc.created_at,
            None => now.clone(),
        };
        let doc = StoredUserAccess::new(user, created_at, now);

        let added = client
            .fluent()
            .update()
            .in_col(collections::USER_ACCESS)
            .document_id(&user.id)
            .object(&doc)
            .add_to_transaction(&mut transaction)
            .map(|_| ());
        if let Err(e) = added {
            let err = AppError::Database(format!("Failed to add user to transaction: {}", e));
            return Err(abort(transaction, err).await);
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(user_id = %user.id, "User grant persisted");
        Ok(())
    }

    /// Read-check-then-delete of one grant document.
    async fn remove(&self, id: &str) -> Result<(), AppError> {
        let client = self.get_client()?;
        let mut transaction = Self::begin(client).await?;

        match find_in_transaction(client, &transaction, id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let err = AppError::NotFound(format!("User {}", id));
                return Err(abort(transaction, err).await);
            }
            Err(e) => return Err(abort(transaction, e).await),
        }

        let added = client
            .fluent()
            .delete()
            .from(collections::USER_ACCESS)
            .document_id(id)
            .add_to_transaction(&mut transaction)
            .map(|_| ());
        if let Err(e) = added {
            let err = AppError::Database(format!("Failed to add delete to transaction: {}", e));
            return Err(abort(transaction, err).await);
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(user_id = %id, "User grant deleted");
        Ok(())
    }

    pub async fn insert_user(&self, ctx: &RequestContext, user: &UserAccess) -> Result<(), AppError> {
        let user = validated(user)?;
        ctx.run(self.save(&user)).await
    }

    pub async fn select_user_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<UserAccess, AppError> {
        let id = normalize_id(id)?;

        ctx.run(async {
            self.find(id)
                .await?
                .map(UserAccess::from)
                .ok_or_else(|| AppError::NotFound(format!("User {}", id)))
        })
        .await
    }

    pub async fn upsert_user(
        &self,
        ctx: &RequestContext,
        user: &UserAccess,
    ) -> Result<UserAccess, AppError> {
        let user = validated(user)?;
        ctx.run(self.save(&user)).await?;
        Ok(user)
    }

    pub async fn delete_user_by_id(&self, ctx: &RequestContext, id: &str) -> Result<(), AppError> {
        let id = normalize_id(id)?;
        ctx.run(self.remove(id)).await
    }
}

/// Read a grant document as part of `transaction`.
async fn find_in_transaction(
    client: &FirestoreDb,
    transaction: &FirestoreTransaction<'_>,
    id: &str,
) -> Result<Option<StoredUserAccess>, AppError> {
    let tx_client = client.clone_with_consistency_selector(
        FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
    );

    tx_client
        .fluent()
        .select()
        .by_id_in(collections::USER_ACCESS)
        .obj()
        .one(id)
        .await
        .map_err(|e| AppError::Database(format!("Failed to read user in transaction: {}", e)))
}

/// Roll back `transaction` and hand back the error that ended it.
async fn abort(transaction: FirestoreTransaction<'_>, err: AppError) -> AppError {
    if let Err(e) = transaction.rollback().await {
        tracing::warn!(error = %e, "Transaction rollback failed");
    }
    err
}
