//! Bounded worker pool
//!
//! Every submitted operation runs as its own tokio task but only `size` of
//! them execute at once; the rest wait for a semaphore permit. Shutdown stops
//! accepting work, waits for in-flight tasks up to a grace period and then
//! cancels whatever is left.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{Result, Rs485Error};

/// Awaitable result of a pooled operation.
///
/// Resolves to `Err` only for internal faults: the task panicked or was
/// cancelled during shutdown.
#[derive(Debug)]
pub struct TaskHandle<T> {
    inner: JoinHandle<Option<T>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Some(value))) => Poll::Ready(Ok(value)),
            Poll::Ready(Ok(None)) => Poll::Ready(Err(Rs485Error::Cancelled(
                "worker pool is shutting down".to_string(),
            ))),
            Poll::Ready(Err(e)) => Poll::Ready(Err(Rs485Error::internal(format!(
                "worker task failed: {}",
                e
            )))),
        }
    }
}

#[derive(Debug)]
pub struct WorkerPool {
    size: usize,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        debug!("Worker pool created with {} workers", size);
        Self {
            size,
            permits: Arc::new(Semaphore::new(size)),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks submitted and not yet finished, queued ones included
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn spawn<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return TaskHandle {
                inner: tokio::spawn(async { None }),
            };
        }

        let permits = Arc::clone(&self.permits);
        let cancel = self.cancel.clone();
        let inner = self.tracker.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => None,
                result = async {
                    let _permit = permits.acquire_owned().await.ok()?;
                    Some(task.await)
                } => result,
            }
        });
        TaskHandle { inner }
    }

    /// Stop accepting work and drain.
    ///
    /// Returns true if every task finished within `grace`; otherwise the
    /// remaining tasks are cancelled and their handles resolve to `Cancelled`.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.closed.store(true, Ordering::Release);
        self.tracker.close();

        let pending = self.tracker.len();
        if pending > 0 {
            info!("Draining {} worker task(s), grace {:?}", pending, grace);
        }

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            return true;
        }

        warn!(
            "Worker pool did not drain within {:?}, cancelling {} task(s)",
            grace,
            self.tracker.len()
        );
        self.cancel.cancel();
        self.tracker.wait().await;
        false
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_spawn_returns_value() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.spawn(async { 21 * 2 }).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                pool.spawn(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let pool = WorkerPool::new(1);
        let handle = pool.spawn(async {
            if true {
                panic!("handler bug");
            }
        });
        assert!(matches!(handle.await, Err(Rs485Error::Internal(_))));
    }

    #[tokio::test]
    async fn test_shutdown_drains_quick_tasks() {
        let pool = WorkerPool::new(2);
        let handle = pool.spawn(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            "done"
        });
        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(handle.await.unwrap(), "done");

        let late = pool.spawn(async { 1 });
        assert!(matches!(late.await, Err(Rs485Error::Cancelled(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_after_grace() {
        let pool = WorkerPool::new(1);
        let stuck = pool.spawn(std::future::pending::<()>());
        assert!(!pool.shutdown(Duration::from_secs(10)).await);
        assert!(matches!(stuck.await, Err(Rs485Error::Cancelled(_))));
    }
}
