// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use crate::cache::{CacheKind, DEFAULT_CACHE_SIZE};
use crate::db::PersistenceKind;
use std::env;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- OAuth ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Google OAuth client secret; also keys token encryption
    pub google_client_secret: String,
    /// Callback registered with Google
    pub google_redirect_url: String,

    // --- Secrets ---
    /// Bearer secret required on internal RPC calls
    pub rpc_secret: String,
    /// JWT signing key for session cookies (raw bytes)
    pub jwt_signing_key: Vec<u8>,

    // --- Server ---
    pub port: u16,
    /// Budget for one RPC or OAuth callback
    pub request_timeout: Duration,

    // --- Backends ---
    pub persistence: PersistenceKind,
    /// GCP project ID (Firestore only)
    pub gcp_project_id: String,
    pub cache_kind: CacheKind,
    pub cache_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let google_client_secret = required("GOOGLE_CLIENT_SECRET")?;
        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map(|v| v.trim().to_string())
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| google_client_secret.clone())
            .into_bytes();

        Ok(Self {
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_redirect_url: env::var("GOOGLE_REDIRECT_URL")
                .unwrap_or_else(|_| "http://localhost:8080/oauth/auth".to_string()),
            google_client_secret,
            rpc_secret: required("RPC_SECRET")?,
            jwt_signing_key,
            port: parsed("PORT", 8080)?,
            request_timeout: Duration::from_secs(parsed("REQUEST_TIMEOUT_SECS", 5)?),
            persistence: kind("PERSISTENCE_TYPE")?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            cache_kind: kind("CACHE_TYPE")?,
            cache_size: parsed("CACHE_SIZE", DEFAULT_CACHE_SIZE)?,
        })
    }

    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            google_client_secret: "test_client_secret".to_string(),
            google_redirect_url: "http://localhost:8080/oauth/auth".to_string(),
            rpc_secret: "test_rpc_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            port: 8080,
            request_timeout: Duration::from_secs(5),
            persistence: PersistenceKind::Memory,
            gcp_project_id: "test-project".to_string(),
            cache_kind: CacheKind::Memory,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, v.clone())),
        _ => Ok(default),
    }
}

fn kind<T>(name: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = String> + Default,
{
    match env::var(name) {
        Ok(v) => v.parse().map_err(|e| ConfigError::Invalid(name, e)),
        Err(_) => Ok(T::default()),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
