//! Fixed-size concurrency batches with pacing between them.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;

/// Run `op` over `items` in consecutive chunks of `batch_size`.
///
/// Every item of a chunk runs concurrently and the whole chunk finishes
/// before the next one starts. The executor sleeps `inter_batch_delay`
/// between chunks but not after the last. Results come back in input order.
/// A `batch_size` of 0 is treated as 1.
pub async fn run_batched<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    mut op: F,
    inter_batch_delay: Duration,
) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    let batch_size = batch_size.max(1);
    let total = items.len();
    let mut results = Vec::with_capacity(total);
    let mut remaining = items.into_iter().peekable();
    let mut batch_index = 0usize;

    while remaining.peek().is_some() {
        let chunk: Vec<T> = remaining.by_ref().take(batch_size).collect();
        tracing::debug!(batch = batch_index, size = chunk.len(), total, "Running batch");

        let futures: Vec<Fut> = chunk.into_iter().map(&mut op).collect();
        results.extend(join_all(futures).await);
        batch_index += 1;

        if remaining.peek().is_some() && !inter_batch_delay.is_zero() {
            tokio::time::sleep(inter_batch_delay).await;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_preserves_order_and_bounds_in_flight() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let items: Vec<usize> = (0..12).collect();
        let results = run_batched(
            items.clone(),
            5,
            |i| {
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    // Later items finish first within a batch.
                    tokio::time::sleep(Duration::from_millis(50 - i as u64)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            },
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(results, items);
        assert_eq!(max_seen.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_batches_but_not_after_last() {
        let start = tokio::time::Instant::now();
        let results = run_batched(
            vec![1, 2, 3, 4, 5, 6, 7],
            3,
            |i| async move { i * 10 },
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(results, vec![10, 20, 30, 40, 50, 60, 70]);
        // Three batches, two pauses.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_treated_as_one() {
        let calls = AtomicUsize::new(0);
        let results = run_batched(
            vec!["a", "b"],
            0,
            |s| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { s.to_uppercase() }
            },
            Duration::ZERO,
        )
        .await;
        assert_eq!(results, vec!["A", "B"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<u8> =
            run_batched(Vec::<u8>::new(), 5, |x| async move { x }, Duration::from_secs(1)).await;
        assert!(results.is_empty());
    }
}
