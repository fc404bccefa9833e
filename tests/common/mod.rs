// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{Duration, Utc};
use gdrive_auth::cache::{CacheKind, UserCache};
use gdrive_auth::config::Config;
use gdrive_auth::crypto::EncryptorKind;
use gdrive_auth::db::{FirestoreUserStore, MemoryUserStore, TokenStore};
use gdrive_auth::error::AppError;
use gdrive_auth::models::UserAccess;
use gdrive_auth::routes::create_router;
use gdrive_auth::services::{GoogleUserInfo, OAuthToken, TokenProvider, UserService};
use gdrive_auth::time_utils::format_utc_rfc3339;
use gdrive_auth::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Key used to encrypt tokens in tests.
#[allow(dead_code)]
pub const TEST_KEY: &[u8] = b"test_client_secret";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test Firestore connection.
#[allow(dead_code)]
pub async fn test_firestore() -> FirestoreUserStore {
    FirestoreUserStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Grant for `id` whose access token expires `expires_in` from now.
#[allow(dead_code)]
pub fn test_user(id: &str, expires_in: Duration) -> UserAccess {
    UserAccess {
        id: id.to_string(),
        access_token: format!("access-{}", id),
        refresh_token: format!("refresh-{}", id),
        token_type: "Bearer".to_string(),
        scope: "https://www.googleapis.com/auth/drive.file".to_string(),
        expiry: format_utc_rfc3339(Utc::now() + expires_in),
    }
}

/// Memory-backed service plus handles on its store and cache.
#[allow(dead_code)]
pub fn memory_service() -> (UserService, MemoryUserStore, UserCache) {
    let store = MemoryUserStore::new();
    let cache = UserCache::new(CacheKind::Memory, 100);
    let service = UserService::new(
        TokenStore::Memory(store.clone()),
        cache.clone(),
        EncryptorKind::AesGcm.build(),
        TEST_KEY,
    );
    (service, store, cache)
}

/// Token provider that counts calls and never touches the network.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeProvider {
    pub refresh_calls: AtomicUsize,
    pub exchange_calls: AtomicUsize,
    /// Delay before each refresh returns
    pub latency: std::time::Duration,
    /// Refresh fails with this message when set
    pub fail_with: Option<String>,
    /// Rotated refresh token to hand back, if any
    pub rotate_to: Option<String>,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn with_latency(latency: std::time::Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn exchanges(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for FakeProvider {
    async fn exchange_code(&self, code: &str) -> Result<OAuthToken, AppError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if code == "bad-code" {
            return Err(AppError::UpstreamProvider("invalid_grant".to_string()));
        }
        Ok(OAuthToken {
            access_token: format!("access-for-{}", code),
            refresh_token: Some(format!("refresh-for-{}", code)),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(3600),
            scope: None,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<OAuthToken, AppError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.latency).await;
        if let Some(message) = &self.fail_with {
            return Err(AppError::UpstreamProvider(message.clone()));
        }
        Ok(OAuthToken {
            access_token: format!("refreshed-{}", n),
            refresh_token: self.rotate_to.clone(),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(3600),
            scope: None,
        })
    }

    async fn user_info(&self, _access_token: &str) -> Result<GoogleUserInfo, AppError> {
        Ok(GoogleUserInfo {
            id: "google-user-1".to_string(),
            email: Some("user@example.com".to_string()),
            locale: Some("en".to_string()),
        })
    }
}

/// Create a test app backed by the memory store and a fake provider.
/// Returns the router, the shared state, and the provider.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<FakeProvider>) {
    let provider = Arc::new(FakeProvider::default());
    let (app, state) = create_test_app_with(Config::test_default(), provider.clone());
    (app, state, provider)
}

/// Create a test app with a custom config and provider.
#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    provider: Arc<FakeProvider>,
) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(
        AppState::new(
            config,
            TokenStore::Memory(MemoryUserStore::new()),
            provider,
        )
        .expect("Failed to build app state"),
    );

    (create_router(state.clone()), state)
}
