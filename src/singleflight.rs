// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request de-duplication keyed by string.
//!
//! Concurrent callers that ask for the same key while a call is in flight
//! await the same shared future and observe the same result. The call runs
//! on its own task and drops its entry when it completes, so the next caller
//! starts fresh even if every waiter went away.

use crate::error::AppError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

type InFlight<T> = Shared<BoxFuture<'static, Result<T, AppError>>>;

/// Collapses concurrent calls for the same key into one execution.
pub struct RequestDeduplicator<T: Clone> {
    in_flight: Arc<DashMap<String, InFlight<T>>>,
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Run `work` for `key`, or join the call already in flight for it.
    ///
    /// `work` is only invoked by the caller that creates the entry. Dropping
    /// a caller does not cancel the shared call.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let (call, pending) = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                tracing::debug!(key, "Joining in-flight call");
                (entry.get().clone(), None)
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel();
                let call = async move {
                    rx.await.unwrap_or_else(|_| {
                        Err(AppError::Internal("De-duplicated call was dropped".to_string()))
                    })
                }
                .boxed()
                .shared();
                entry.insert(call.clone());
                (call, Some((work(), tx)))
            }
        };

        if let Some((fut, tx)) = pending {
            let in_flight = self.in_flight.clone();
            let key = key.to_string();
            let registered = call.clone();
            tokio::spawn(async move {
                let result = fut.await;
                in_flight.remove_if(&key, |_, current| current.ptr_eq(&registered));
                // Fails only if every waiter is gone
                let _ = tx.send(result);
            });
        }

        call.await
    }

    /// Number of keys with a call in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl<T> Default for RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_calls_share_one_execution() {
        let dedup = Arc::new(RequestDeduplicator::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let dedup = dedup.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                dedup
                    .run("u1", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_shared() {
        let dedup = Arc::new(RequestDeduplicator::<u32>::new());

        let first = {
            let dedup = dedup.clone();
            tokio::spawn(async move {
                dedup
                    .run("u1", || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(AppError::UpstreamProvider("invalid_grant".to_string()))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = dedup.run("u1", || async { Ok(1) }).await;

        let first = first.await.unwrap();
        assert!(matches!(first, Err(AppError::UpstreamProvider(_))));
        assert!(matches!(second, Err(AppError::UpstreamProvider(_))));
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let dedup = RequestDeduplicator::<String>::new();
        let calls = AtomicUsize::new(0);

        let (a, b) = tokio::join!(
            dedup.run("a", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("a".to_string()) }
            }),
            dedup.run("b", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("b".to_string()) }
            }),
        );

        assert_eq!(a.unwrap(), "a");
        assert_eq!(b.unwrap(), "b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sequential_calls_run_again() {
        let dedup = RequestDeduplicator::<u32>::new();
        let first = dedup.run("u1", || async { Ok(1) }).await.unwrap();
        let second = dedup.run("u1", || async { Ok(2) }).await.unwrap();
        assert_eq!((first, second), (1, 2));
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_strand_entry() {
        let dedup = RequestDeduplicator::<u32>::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let counter = finished.clone();
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            dedup.run("u1", move || async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight(), 0);

        // A later caller runs fresh work instead of joining the stale call
        assert_eq!(dedup.run("u1", || async { Ok(2) }).await.unwrap(), 2);
    }
}
