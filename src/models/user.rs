//! OAuth grant model for storage and RPC.

use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Scheme label written on every refreshed grant.
pub const BEARER: &str = "Bearer";

/// A Drive user's delegated OAuth grant.
///
/// The token fields hold plaintext when the value is handed to callers and
/// ciphertext while it sits in the store or the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccess {
    /// Google user ID (also used as document ID)
    pub id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Space-delimited granted scopes
    pub scope: String,
    /// When the access token expires (RFC 3339)
    pub expiry: String,
}

impl UserAccess {
    /// Trim every field in place and reject the first blank one.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let fields: [(&mut String, &'static str); 6] = [
            (&mut self.id, "ID"),
            (&mut self.access_token, "OAuth Access Token"),
            (&mut self.refresh_token, "OAuth Refresh Token"),
            (&mut self.token_type, "OAuth Token Type"),
            (&mut self.scope, "OAuth Scope"),
            (&mut self.expiry, "Expiry"),
        ];

        for (value, field) in fields {
            let trimmed = value.trim();
            if trimmed.len() != value.len() {
                *value = trimmed.to_string();
            }
            if value.is_empty() {
                return Err(AppError::Validation {
                    field,
                    reason: "Should not be empty",
                });
            }
        }

        Ok(())
    }

    /// Same record with both tokens replaced.
    pub fn with_tokens(&self, access_token: String, refresh_token: String) -> Self {
        Self {
            id: self.id.clone(),
            access_token,
            refresh_token,
            token_type: self.token_type.clone(),
            scope: self.scope.clone(),
            expiry: self.expiry.clone(),
        }
    }
}

/// Encrypted grant as stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUserAccess {
    pub uid: String,
    /// Encrypted access token (base64)
    pub access_token: String,
    /// Encrypted refresh token (base64)
    pub refresh_token: String,
    pub token_type: String,
    pub scope: String,
    pub expiry: String,
    /// When the grant was first stored
    pub created_at: String,
    /// Last rotation
    pub updated_at: String,
}

impl StoredUserAccess {
    pub fn new(user: &UserAccess, created_at: String, updated_at: String) -> Self {
        Self {
            uid: user.id.clone(),
            access_token: user.access_token.clone(),
            refresh_token: user.refresh_token.clone(),
            token_type: user.token_type.clone(),
            scope: user.scope.clone(),
            expiry: user.expiry.clone(),
            created_at,
            updated_at,
        }
    }
}

impl From<StoredUserAccess> for UserAccess {
    fn from(doc: StoredUserAccess) -> Self {
        Self {
            id: doc.uid,
            access_token: doc.access_token,
            refresh_token: doc.refresh_token,
            token_type: doc.token_type,
            scope: doc.scope,
            expiry: doc.expiry,
        }
    }
}
