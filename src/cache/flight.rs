//! Per-key collapse of concurrent cache misses.
//!
//! Two callers that miss on the same resource identity at the same time
//! would otherwise both read and render. [`Flight::run`] hands the second
//! caller the first caller's pending future instead. The slot is removed as
//! soon as the leader settles (or is cancelled), so results are never served
//! from here after the fact: completed work lives in the stores or nowhere.

use std::future::Future;
use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::application::render::PipelineError;

type SharedCompute<T> = Shared<BoxFuture<'static, Result<T, PipelineError>>>;

pub struct Flight<T> {
    inflight: Arc<DashMap<String, SharedCompute<T>>>,
}

impl<T> Default for Flight<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }
}

impl<T> Clone for Flight<T> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
        }
    }
}

enum Role<T> {
    Leader(SharedCompute<T>),
    Follower(SharedCompute<T>),
}

impl<T> Flight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `compute` for `key`, unless a computation for the same key is
    /// already pending, in which case await that one.
    pub async fn run<F>(&self, key: &str, compute: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>> + Send + 'static,
    {
        let role = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(existing) => Role::Follower(existing.get().clone()),
            Entry::Vacant(slot) => {
                let shared = compute.boxed().shared();
                slot.insert(shared.clone());
                Role::Leader(shared)
            }
        };

        match role {
            Role::Follower(shared) => shared.await,
            Role::Leader(shared) => {
                // The guard clears the slot even if the leader is cancelled
                // mid-await; followers already hold the shared future and
                // drive it to completion on their own.
                let _slot = SlotGuard {
                    inflight: &self.inflight,
                    key,
                };
                shared.await
            }
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.inflight.len()
    }
}

struct SlotGuard<'a, T> {
    inflight: &'a DashMap<String, SharedCompute<T>>,
    key: &'a str,
}

impl<T> Drop for SlotGuard<'_, T> {
    fn drop(&mut self) {
        self.inflight.remove(self.key);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn read_error(detail: &str) -> PipelineError {
        PipelineError::Read {
            path: "test".to_string(),
            kind: std::io::ErrorKind::Other,
            detail: detail.to_string(),
        }
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_computation() {
        let flight: Flight<u32> = Flight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let compute = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(7)
        };

        let (a, b) = tokio::join!(
            flight.run("k", compute(Arc::clone(&calls))),
            flight.run("k", compute(Arc::clone(&calls))),
        );

        assert_eq!(a.expect("first result"), 7);
        assert_eq!(b.expect("second result"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slot_is_cleared_after_completion() {
        let flight: Flight<u32> = Flight::new();

        let first = flight.run("k", async { Ok(1) }).await;
        assert_eq!(first.expect("first"), 1);
        assert_eq!(flight.pending(), 0);

        // A later call recomputes instead of replaying the old result.
        let second = flight.run("k", async { Ok(2) }).await;
        assert_eq!(second.expect("second"), 2);
    }

    #[tokio::test]
    async fn failures_are_not_sticky() {
        let flight: Flight<u32> = Flight::new();

        let failed = flight.run("k", async { Err(read_error("boom")) }).await;
        assert!(failed.is_err());
        assert_eq!(flight.pending(), 0);

        let retried = flight.run("k", async { Ok(3) }).await;
        assert_eq!(retried.expect("retry succeeds"), 3);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_collapse() {
        let flight: Flight<u32> = Flight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let compute = |calls: Arc<AtomicUsize>, value: u32| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        };

        let (a, b) = tokio::join!(
            flight.run("a", compute(Arc::clone(&calls), 1)),
            flight.run("b", compute(Arc::clone(&calls), 2)),
        );

        assert_eq!(a.expect("a"), 1);
        assert_eq!(b.expect("b"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
