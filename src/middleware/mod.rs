// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (RPC authentication, session tokens, security headers).

pub mod auth;
pub mod security;

pub use auth::require_rpc_auth;
