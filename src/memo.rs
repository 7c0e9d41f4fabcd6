//! Single-slot memoized value with explicit invalidation.
//!
//! Used for lazily-recomputed repository metadata (collaborators, labels,
//! assignees). The slot lock is held across the load, so concurrent first
//! access triggers exactly one underlying fetch; invalidation clears the
//! slot and the next read recomputes it.

use std::sync::Arc;

use tokio::sync::Mutex;

/// A lazily-computed, explicitly-invalidatable cached value.
pub struct MemoizedValue<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> MemoizedValue<T> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::const_new(None),
        }
    }

    /// Returns the cached value, computing it through `load` when the slot
    /// is empty.
    ///
    /// Losers of a concurrent first-access race wait on the slot lock and
    /// then observe the winner's value instead of fetching again. A failed
    /// load leaves the slot empty, so the next read retries.
    ///
    /// # Errors
    ///
    /// Propagates the load function's error.
    pub async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(load().await?);
        *slot = Some(Arc::clone(&value));
        Ok(value)
    }

    /// Clears the slot so the next read recomputes the value.
    pub async fn invalidate(&self) {
        drop(self.slot.lock().await.take());
    }
}

impl<T> Default for MemoizedValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for MemoizedValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoizedValue").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::MemoizedValue;

    #[tokio::test]
    async fn second_read_reuses_the_cached_value() {
        let memo = MemoizedValue::new();
        let loads = AtomicUsize::new(0);

        let first = memo
            .get_or_load(|| {
                loads.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Ok::<_, ()>(41))
            })
            .await
            .expect("load should succeed");
        let second = memo
            .get_or_load(|| {
                loads.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Ok::<_, ()>(42))
            })
            .await
            .expect("cached read should succeed");

        assert_eq!(*first, 41);
        assert_eq!(*second, 41);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_first_access_loads_exactly_once() {
        let memo = Arc::new(MemoizedValue::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let memo_ref = Arc::clone(&memo);
                let counter = Arc::clone(&loads);
                tokio::spawn(async move {
                    memo_ref
                        .get_or_load(|| async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            Ok::<_, ()>("value")
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            let value = task
                .await
                .expect("task should join")
                .expect("load should succeed");
            assert_eq!(*value, "value");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_a_reload() {
        let memo = MemoizedValue::new();
        let loads = AtomicUsize::new(0);
        let load = || {
            let count = loads.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok::<_, ()>(count))
        };

        let first = memo.get_or_load(load).await.expect("load should succeed");
        memo.invalidate().await;
        let second = memo.get_or_load(load).await.expect("reload should succeed");

        assert_eq!(*first, 0);
        assert_eq!(*second, 1);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_load_leaves_the_slot_empty() {
        let memo: MemoizedValue<u32> = MemoizedValue::new();
        let result = memo
            .get_or_load(|| std::future::ready(Err("boom")))
            .await;
        assert_eq!(result.unwrap_err(), "boom");

        let recovered = memo
            .get_or_load(|| std::future::ready(Ok::<_, &str>(7)))
            .await
            .expect("retry should succeed");
        assert_eq!(*recovered, 7);
    }
}
