// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth login routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::context::RequestContext;
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_session_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::models::{UserAccess, BEARER};
use crate::services::google::DRIVE_SCOPES;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

/// Where the browser lands after a successful login.
pub const POST_LOGIN_REDIRECT: &str = "https://drive.google.com/";

/// Cookie holding the anti-forgery nonce between login and callback.
pub const OAUTH_STATE_COOKIE: &str = "gdrive_oauth_state";

const OAUTH_STATE_TTL_SECS: i64 = 10 * 60;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/oauth/login", get(auth_start))
        .route("/oauth/auth", get(auth_callback))
}

/// Start OAuth flow - redirect to Google consent.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let mut nonce = [0u8; 16];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| AppError::Internal("Failed to generate OAuth state".to_string()))?;
    let oauth_state = URL_SAFE_NO_PAD.encode(nonce);

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, oauth_state.clone()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(OAUTH_STATE_TTL_SECS));

    tracing::info!(
        client_id = %state.config.google_client_id,
        "Starting OAuth flow, redirecting to Google"
    );

    let auth_url = state.oauth_client.authorization_url(&oauth_state);
    Ok((jar.add(cookie), Redirect::temporary(&auth_url)))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    /// Absent when consent was started from the Drive install flow.
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, store the grant, create session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        return Err(AppError::BadRequest(format!("OAuth error: {}", error)));
    }

    let code = params.code.as_deref().map(str::trim).unwrap_or_default();
    if code.is_empty() {
        tracing::debug!("Empty auth code parameter");
        return Err(AppError::BadRequest("Missing authorization code".to_string()));
    }

    if let Some(expected) = params.state.as_deref() {
        let matches = jar
            .get(OAUTH_STATE_COOKIE)
            .map(|c| bool::from(c.value().as_bytes().ct_eq(expected.as_bytes())))
            .unwrap_or(false);
        if !matches {
            tracing::warn!("OAuth state does not match login cookie");
            return Err(AppError::BadRequest("Invalid OAuth state".to_string()));
        }
    }

    tracing::info!("Exchanging authorization code for tokens");

    // Browsers and proxies may deliver the same code more than once
    let app = state.clone();
    let owned_code = code.to_string();
    let user = state
        .code_exchanges
        .run(code, move || async move {
            let ctx = RequestContext::with_timeout(app.config.request_timeout);
            complete_login(&app, &ctx, &owned_code).await
        })
        .await?;

    tracing::info!(user_id = %user.id, "OAuth successful, grant stored");

    let jwt = create_session_jwt(&user.id, &state.config.jwt_signing_key)?;
    let session = Cookie::build((SESSION_COOKIE, jwt))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64));

    let jar = jar
        .remove(Cookie::build(OAUTH_STATE_COOKIE).path("/"))
        .add(session);

    Ok((jar, Redirect::to(POST_LOGIN_REDIRECT)))
}

/// Exchange the code, identify the user, and persist the grant.
async fn complete_login(
    state: &AppState,
    ctx: &RequestContext,
    code: &str,
) -> Result<UserAccess> {
    let token = ctx
        .run(state.provider.exchange_code(code))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Could not exchange authorization code");
            e
        })?;

    let info = ctx.run(state.provider.user_info(&token.access_token)).await?;

    let refresh_token = token.refresh_token.clone().ok_or_else(|| {
        AppError::UpstreamProvider("Google did not issue a refresh token".to_string())
    })?;

    let user = UserAccess {
        id: info.id,
        expiry: format_utc_rfc3339(token.expiry_from(chrono::Utc::now())),
        access_token: token.access_token,
        refresh_token,
        token_type: token.token_type.unwrap_or_else(|| BEARER.to_string()),
        scope: DRIVE_SCOPES.join(" "),
    };

    state.user_service.update_user(ctx, &user).await
}
