//! A fair, cancellable bounded admission gate for concurrent reads.
//!
//! Grounded on `tokio::sync::Semaphore`, which already grants permits in FIFO
//! submission order and drops a queued waiter cleanly when its future is
//! cancelled - exactly the two properties the bottleneck's invariants require.
//! The only thing layered on top here is permit idempotency, since
//! `OwnedSemaphorePermit::drop` already releases but the reader contract
//! additionally allows (and expects) an explicit, repeatable `release()`.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Fair bounded admission gate of capacity `max_read_parallelism`.
#[derive(Debug)]
pub struct AsyncBottleneck {
    semaphore: Arc<Semaphore>,
}

impl AsyncBottleneck {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Number of slots not currently held by a permit.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Acquire a permit, waiting FIFO if none is free. Returns `None` if
    /// `token` is cancelled before a slot becomes available; a cancelled
    /// waiter never consumes a slot.
    pub async fn enter(&self, token: &CancellationToken) -> Option<BottleneckPermit> {
        tokio::select! {
            biased;

            () = token.cancelled() => None,
            permit = self.semaphore.clone().acquire_owned() => {
                // The semaphore is never closed, so acquire_owned cannot fail.
                let permit = permit.expect("bottleneck semaphore was closed unexpectedly");
                Some(BottleneckPermit::new(permit))
            }
        }
    }
}

/// A scoped read permit. Dropping it releases the slot; calling
/// [`BottleneckPermit::release`] explicitly does the same and is idempotent -
/// releasing twice (once explicitly, once via `Drop`) is a no-op the second time.
#[derive(Debug)]
pub struct BottleneckPermit {
    permit: Mutex<Option<OwnedSemaphorePermit>>,
}

impl BottleneckPermit {
    fn new(permit: OwnedSemaphorePermit) -> Self {
        Self {
            permit: Mutex::new(Some(permit)),
        }
    }

    /// Release the slot now instead of waiting for `Drop`. Safe to call more
    /// than once, and safe to call even though a subsequent `Drop` will also run.
    pub async fn release(&self) {
        let mut slot = self.permit.lock().await;
        slot.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn grants_up_to_capacity_immediately() {
        let bottleneck = AsyncBottleneck::new(2);
        let token = CancellationToken::new();

        let a = bottleneck.enter(&token).await;
        let b = bottleneck.enter(&token).await;

        assert!(a.is_some());
        assert!(b.is_some());
        assert_eq!(bottleneck.available_permits(), 0);
    }

    #[tokio::test]
    async fn release_frees_a_slot_for_the_next_waiter() {
        let bottleneck = Arc::new(AsyncBottleneck::new(1));
        let token = CancellationToken::new();

        let first = bottleneck.enter(&token).await.unwrap();

        let bottleneck_clone = bottleneck.clone();
        let token_clone = token.clone();
        let waiter = tokio::spawn(async move { bottleneck_clone.enter(&token_clone).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(bottleneck.available_permits(), 0);

        first.release().await;

        let second = waiter.await.unwrap();
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn double_release_is_a_no_op() {
        let bottleneck = AsyncBottleneck::new(1);
        let token = CancellationToken::new();

        let permit = bottleneck.enter(&token).await.unwrap();
        permit.release().await;
        permit.release().await;

        assert_eq!(bottleneck.available_permits(), 1);
    }

    #[tokio::test]
    async fn cancelled_waiter_never_consumes_a_slot() {
        let bottleneck = AsyncBottleneck::new(1);
        let token = CancellationToken::new();
        token.cancel();

        let result = bottleneck.enter(&token).await;

        assert!(result.is_none());
        assert_eq!(bottleneck.available_permits(), 1);
    }

    #[tokio::test]
    async fn waiters_are_granted_in_fifo_order() {
        let bottleneck = Arc::new(AsyncBottleneck::new(1));
        let token = CancellationToken::new();

        let held = bottleneck.enter(&token).await.unwrap();

        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for id in 0..3 {
            let bottleneck = bottleneck.clone();
            let token = token.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let permit = bottleneck.enter(&token).await.unwrap();
                order.lock().unwrap().push(id);
                permit
            }));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        held.release().await;

        for handle in handles {
            let permit = handle.await.unwrap();
            permit.release().await;
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
