//! Fixed-concurrency worker pool.
//!
//! Work is spawned onto the tokio runtime immediately, but every task has to take one of
//! `capacity` semaphore permits before it starts running, so at most `capacity` units of work are
//! ever executing. Finished work comes back through [`WorkerPool::next_completed`] in completion
//! order, which is unrelated to submission order.

use std::future::Future;

use futures::FutureExt;
use tokio::{
  sync::Semaphore,
  task::{JoinError, JoinSet},
};

use super::*;

/// A bounded pool of tokio tasks producing values of type `T`.
#[derive(Debug)]
pub struct WorkerPool<T> {
  /// Submitted work that has not been collected yet
  tasks:    JoinSet<T>,
  /// Running permits, one per concurrent slot
  permits:  Arc<Semaphore>,
  /// Maximum number of concurrently running tasks
  capacity: usize,
}

impl<T: Send + 'static> WorkerPool<T> {
  /// Creates a pool that runs at most `capacity` tasks at a time.
  ///
  /// # Errors
  ///
  /// Returns [`HarvestError::Config`] when `capacity` is zero.
  pub fn new(capacity: usize) -> Result<Self> {
    if capacity == 0 {
      return Err(HarvestError::Config("worker pool needs at least one slot".into()));
    }
    Ok(Self { tasks: JoinSet::new(), permits: Arc::new(Semaphore::new(capacity)), capacity })
  }

  /// Queues `work`. Never blocks; the work waits for a free slot before it starts.
  pub fn submit<F>(&mut self, work: F)
  where F: Future<Output = T> + Send + 'static {
    let permits = Arc::clone(&self.permits);
    self.tasks.spawn(async move {
      // The semaphore is never closed.
      let _permit = permits.acquire_owned().await.ok();
      work.await
    });
  }

  /// Maximum number of concurrently running tasks.
  pub fn capacity(&self) -> usize { self.capacity }

  /// Number of submitted tasks whose results have not been collected.
  pub fn in_flight(&self) -> usize { self.tasks.len() }

  /// Whether another submission would still start without waiting for a slot.
  pub fn has_capacity(&self) -> bool { self.tasks.len() < self.capacity }

  /// Waits for the next task to finish, in completion order.
  ///
  /// Returns `None` once nothing is left in the pool.
  pub async fn next_completed(&mut self) -> Option<core::result::Result<T, JoinError>> {
    self.tasks.join_next().await
  }

  /// Aborts everything still queued or running. Results of aborted work are never reported.
  pub fn abandon(&mut self) {
    if !self.tasks.is_empty() {
      debug!("Abandoning {} pending tasks", self.tasks.len());
    }
    self.tasks.abort_all();
    self.tasks.detach_all();
  }
}

/// Runs `work`, turning a panic into `on_panic()` instead of tearing down the pool task.
pub(crate) async fn guarded<T, F>(work: F, on_panic: impl FnOnce() -> T) -> T
where F: Future<Output = T> {
  match std::panic::AssertUnwindSafe(work).catch_unwind().await {
    Ok(value) => value,
    Err(_) => on_panic(),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[test]
  fn test_zero_capacity_is_rejected() {
    assert!(matches!(WorkerPool::<()>::new(0), Err(HarvestError::Config(_))));
  }

  #[traced_test]
  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrency_never_exceeds_capacity() {
    let mut pool = WorkerPool::new(3).unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for i in 0..20u64 {
      let running = Arc::clone(&running);
      let peak = Arc::clone(&peak);
      pool.submit(async move {
        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2 + i % 5)).await;
        running.fetch_sub(1, Ordering::SeqCst);
        i
      });
    }
    assert_eq!(pool.in_flight(), 20);

    let mut seen = Vec::new();
    while let Some(done) = pool.next_completed().await {
      seen.push(done.unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(pool.in_flight(), 0);
  }

  #[traced_test]
  #[tokio::test]
  async fn test_completions_arrive_in_completion_order() {
    let mut pool = WorkerPool::new(4).unwrap();
    for (value, delay) in [(1u64, 40u64), (2, 5), (3, 20)] {
      pool.submit(async move {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        value
      });
    }

    let mut order = Vec::new();
    while let Some(done) = pool.next_completed().await {
      order.push(done.unwrap());
    }
    assert_eq!(order, vec![2, 3, 1]);
  }

  fn value_of_seven() -> u32 { 7 }

  #[traced_test]
  #[tokio::test]
  async fn test_guarded_maps_panics() {
    let value = guarded(
      async {
        if value_of_seven() == 7 {
          panic!("boom");
        }
        0u32
      },
      || 7u32,
    )
    .await;
    assert_eq!(value, 7);
    let value = guarded(async { 3u32 }, || 7u32).await;
    assert_eq!(value, 3);
  }

  #[traced_test]
  #[tokio::test]
  async fn test_abandon_empties_the_pool() {
    let mut pool = WorkerPool::new(1).unwrap();
    for _ in 0..5 {
      pool.submit(async { tokio::time::sleep(Duration::from_secs(60)).await });
    }
    pool.abandon();
    assert_eq!(pool.in_flight(), 0);
    assert!(pool.next_completed().await.is_none());
  }
}
