// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request-scoped deadline threaded through every store, cache, and service call.

use crate::error::AppError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline carried by a single request.
///
/// A context without a deadline never times out.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context that never expires.
    pub fn background() -> Self {
        Self { deadline: None }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Derive a context that expires after `timeout` or at the parent deadline,
    /// whichever comes first.
    pub fn child(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Fail fast with `OperationTimeout` if the deadline has already passed.
    pub fn check(&self) -> Result<(), AppError> {
        if self.is_expired() {
            return Err(AppError::OperationTimeout);
        }
        Ok(())
    }

    /// Run `fut` to completion unless the deadline elapses first.
    ///
    /// The future is dropped (and its outstanding work abandoned) on timeout.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        self.check()?;
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| AppError::OperationTimeout)?,
            None => fut.await,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}
