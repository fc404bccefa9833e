// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and token lifetimes.

use crate::error::AppError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;

/// Fraction of the remaining token lifetime an entry may stay cached.
const CACHE_TTL_DIVISOR: i32 = 6;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored expiry timestamp.
pub fn parse_expiry(expiry: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(expiry.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::Validation {
            field: "Expiry",
            reason: "Should be an RFC 3339 timestamp",
        })
}

/// Cache TTL for a grant expiring at `expiry`: one sixth of what is left.
///
/// Returns `None` when the grant is already expired, so nothing is cached.
pub fn cache_ttl(expiry: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    let remaining = expiry - now;
    (remaining / CACHE_TTL_DIVISOR)
        .to_std()
        .ok()
        .filter(|ttl| !ttl.is_zero())
}
