// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! gdrive-auth: OAuth grant custody for the Google Drive editor connector
//!
//! This crate stores users' Google OAuth grants encrypted at rest, serves
//! them to other services over an internal RPC surface, and refreshes
//! access tokens shortly before they expire.

pub mod cache;
pub mod config;
pub mod context;
pub mod crypto;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod singleflight;
pub mod time_utils;

use cache::UserCache;
use config::Config;
use crypto::EncryptorKind;
use db::TokenStore;
use error::AppError;
use models::UserAccess;
use services::{GoogleOAuthClient, TokenProvider, UserSelectHandler, UserService};
use singleflight::RequestDeduplicator;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub user_service: UserService,
    pub select_handler: UserSelectHandler,
    /// Builds consent URLs
    pub oauth_client: GoogleOAuthClient,
    /// Code exchange, refresh, and userinfo calls
    pub provider: Arc<dyn TokenProvider>,
    /// Collapses duplicate deliveries of the same authorization code
    pub code_exchanges: RequestDeduplicator<UserAccess>,
}

impl AppState {
    /// Wire services around an already connected store.
    pub fn new(
        config: Config,
        store: TokenStore,
        provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, AppError> {
        let cache = UserCache::new(config.cache_kind, config.cache_size);
        let user_service = UserService::new(
            store,
            cache,
            EncryptorKind::default().build(),
            config.google_client_secret.as_bytes(),
        );
        let select_handler = UserSelectHandler::new(
            user_service.clone(),
            provider.clone(),
            Arc::new(RequestDeduplicator::new()),
        );
        let oauth_client = GoogleOAuthClient::new(
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            config.google_redirect_url.clone(),
        )?;

        Ok(Self {
            config,
            user_service,
            select_handler,
            oauth_client,
            provider,
            code_exchanges: RequestDeduplicator::new(),
        })
    }
}
