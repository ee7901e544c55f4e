//! Dataflow helpers: spawning tasks, joining their results and bounding
//! the number of iterations in flight.

use std::future::Future;
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{ArrayError, Result};

/// Run `task` on the runtime and wait for its result.
///
/// A panicking task surfaces as [`ArrayError::Task`].
pub async fn spawn_task<F, T>(task: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(task).await?
}

/// Run a CPU-bound closure on the blocking pool.
pub async fn spawn_compute<F, T>(compute: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(compute).await?
}

/// Wait for all futures, failing as soon as one of them fails.
pub async fn when_all<I, F, T>(futures: I) -> Result<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>>,
{
    try_join_all(futures).await
}

/// Bounds how many iterations of a long running computation are in flight.
///
/// [`submit`](Self::submit) blocks the caller until an earlier iteration
/// completes once the limit is reached, so a model loop cannot build up an
/// unbounded chain of pending work.
#[derive(Clone, Debug)]
pub struct Backpressure {
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
}

/// Handle to a submitted iteration.
pub struct Iteration<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> Iteration<T> {
    /// Wait for the iteration to finish.
    pub async fn join(self) -> Result<T> {
        self.handle.await?
    }
}

impl Backpressure {
    /// Create a limiter allowing `max_in_flight` iterations.
    pub fn new(max_in_flight: usize) -> Result<Self> {
        if max_in_flight == 0 {
            return Err(ArrayError::configuration(
                "the number of iterations in flight must be > 0",
            ));
        }
        Ok(Self::with_limit(max_in_flight))
    }

    pub(crate) fn with_limit(max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Number of submitted iterations that have not completed yet.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.semaphore.available_permits()
    }

    /// Wait for a slot and start `iteration` on the runtime.
    ///
    /// The slot is held until the iteration's future completes, whether or
    /// not anyone joins the returned handle.
    pub async fn submit<F, T>(&self, iteration: F) -> Result<Iteration<T>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.acquire().await?;

        let handle = tokio::spawn(async move {
            let result = iteration.await;
            drop(permit);
            result
        });

        Ok(Iteration { handle })
    }

    /// Wait for a slot, then call `build` to create the iteration and start
    /// it on the runtime.
    ///
    /// Unlike [`submit`](Self::submit), nothing the iteration schedules
    /// exists before the slot is granted, so eagerly spawned work such as
    /// partition tasks stays within the limit too.
    pub async fn submit_with<B, F, T>(&self, build: B) -> Result<Iteration<T>>
    where
        B: FnOnce() -> Result<F>,
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.acquire().await?;
        let iteration = build()?;

        let handle = tokio::spawn(async move {
            let result = iteration.await;
            drop(permit);
            result
        });

        Ok(Iteration { handle })
    }

    /// Wait for a slot without starting anything; the slot is released when
    /// the permit is dropped.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ArrayError::task("iteration limiter closed"))?;
        debug!(in_flight = self.in_flight(), max = self.max_in_flight, "Iteration admitted");
        Ok(permit)
    }

    /// Wait until every submitted iteration has completed.
    pub async fn drain(&self) -> Result<()> {
        let permits = u32::try_from(self.max_in_flight)
            .map_err(|_| ArrayError::configuration("too many iterations in flight"))?;
        let _all = self
            .semaphore
            .acquire_many(permits)
            .await
            .map_err(|_| ArrayError::task("iteration limiter closed"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_zero_limit_is_rejected() {
        assert!(Backpressure::new(0).is_err());
    }

    #[tokio::test]
    async fn test_when_all_fails_fast() {
        let futures = vec![
            Box::pin(async { Ok(1) }) as std::pin::Pin<Box<dyn Future<Output = Result<i32>> + Send>>,
            Box::pin(async { Err(ArrayError::task("second")) }),
        ];
        assert_eq!(when_all(futures).await, Err(ArrayError::task("second")));
    }

    #[tokio::test]
    async fn test_spawn_task_reports_panic() {
        let result: Result<()> = spawn_task(async { panic!("boom") }).await;
        assert!(matches!(result, Err(ArrayError::Task(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_submit_bounds_in_flight() {
        let limiter = Backpressure::new(2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut iterations = Vec::new();

        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let iteration = limiter
                .submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
            assert!(limiter.in_flight() <= 2);
            iterations.push(iteration);
        }

        limiter.drain().await.unwrap();
        assert_eq!(limiter.in_flight(), 0);
        assert!(peak.load(Ordering::SeqCst) <= 2);

        for iteration in iterations {
            iteration.join().await.unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_submit_with_builds_only_after_slot_is_free() {
        let limiter = Backpressure::new(2).unwrap();
        let built = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let mut iterations = Vec::new();

        for _ in 0..8 {
            let finished_in_iteration = Arc::clone(&finished);
            let iteration = limiter
                .submit_with(|| {
                    // Work created here counts as in flight
                    let alive = built.fetch_add(1, Ordering::SeqCst) + 1
                        - finished.load(Ordering::SeqCst);
                    assert!(alive <= 2);
                    Ok(async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        finished_in_iteration.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                })
                .await
                .unwrap();
            iterations.push(iteration);
        }

        for iteration in iterations {
            iteration.join().await.unwrap();
        }
        assert_eq!(built.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_submit_with_build_error_releases_slot() {
        let limiter = Backpressure::new(1).unwrap();
        let result = limiter
            .submit_with(|| Err::<std::future::Ready<Result<()>>, _>(ArrayError::task("build")))
            .await;
        assert!(result.is_err());
        assert_eq!(limiter.in_flight(), 0);
    }
}
