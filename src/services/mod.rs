// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod google;
pub mod select;
pub mod user;

pub use google::{GoogleOAuthClient, GoogleUserInfo, OAuthToken, TokenProvider};
pub use select::UserSelectHandler;
pub use user::UserService;
