//! Storage Gate
//!
//! Bounds the number of operations in flight against a store handle. Callers
//! beyond the bound wait for a slot. The gate is a backpressure valve in front
//! of the database pool; it gives no ordering or isolation guarantees.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::StoreError;

/// Default concurrency: available parallelism minus a quarter, at least 1
pub fn default_max_concurrency() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores - cores / 4).max(1)
}

/// Counting gate over a cloneable store handle (a pool, or shared state).
#[derive(Debug, Clone)]
pub struct StorageGate<H> {
    handle: H,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl<H> StorageGate<H>
where
    H: Clone + Send + 'static,
{
    pub fn new(handle: H, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Slots not currently held by a running operation
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Stop accepting work. Running operations finish; queued and future
    /// callers get `StoreError::Unavailable`.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Run `op` once a slot is free.
    ///
    /// If `cancel` fires before a slot is acquired, `op` never runs. If it fires
    /// while `op` is running, `op` still completes in the background and keeps
    /// its slot until then, but the caller receives `StoreError::Cancelled`.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(H) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Storage call cancelled while waiting for a slot");
                return Err(StoreError::Cancelled);
            }
            permit = self.permits.clone().acquire_owned() => {
                permit.map_err(|_| StoreError::Unavailable("storage gate is closed".to_string()))?
            }
        };

        let handle = self.handle.clone();
        let running = tokio::spawn(async move {
            let _permit = permit;
            op(handle).await
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Storage call cancelled while running, result will be discarded");
                Err(StoreError::Cancelled)
            }
            joined = running => match joined {
                Ok(result) => result,
                Err(e) => Err(StoreError::Unavailable(format!("storage operation aborted: {}", e))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{oneshot, Notify};
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_default_max_concurrency_at_least_one() {
        assert!(default_max_concurrency() >= 1);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let gate = StorageGate::new((), 0);
        assert_eq!(gate.max_concurrency(), 1);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_execute_returns_result_and_releases_slot() {
        let gate = StorageGate::new(41_u32, 2);
        let cancel = CancellationToken::new();

        let result = gate.execute(&cancel, |h| async move { Ok(h + 1) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_failure_releases_slot() {
        let gate = StorageGate::new((), 1);
        let cancel = CancellationToken::new();

        let result: Result<(), _> = gate
            .execute(&cancel, |_| async { Err(StoreError::NotFound("id = 7".to_string())) })
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_operations_never_exceed_bound() {
        let gate = StorageGate::new((), 3);
        let cancel = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut calls = Vec::new();
        for _ in 0..20 {
            let gate = gate.clone();
            let cancel = cancel.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            calls.push(tokio::spawn(async move {
                gate.execute(&cancel, move |_| async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }));
        }

        for call in calls {
            call.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test]
    async fn test_cancel_while_queued_skips_operation() {
        let gate = StorageGate::new((), 1);
        let cancel = CancellationToken::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        // Hold the only slot
        let holder = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                gate.execute(&cancel, move |_| async move {
                    let _ = release_rx.await;
                    Ok(())
                })
                .await
            })
        };
        while gate.available() > 0 {
            tokio::task::yield_now().await;
        }

        let queued_cancel = CancellationToken::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_op = ran.clone();
        let mut queued = task::spawn(gate.execute(&queued_cancel, move |_| async move {
            ran_in_op.store(true, Ordering::SeqCst);
            Ok(())
        }));

        assert_pending!(queued.poll());

        queued_cancel.cancel();
        let result = assert_ready!(queued.poll());
        assert!(matches!(result, Err(StoreError::Cancelled)));

        release_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_running_completes_operation_in_background() {
        let gate = StorageGate::new((), 1);
        let cancel = CancellationToken::new();
        let started = Arc::new(Notify::new());
        let proceed = Arc::new(Notify::new());
        let (done_tx, done_rx) = oneshot::channel::<()>();

        let call = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            let started = started.clone();
            let proceed = proceed.clone();
            tokio::spawn(async move {
                gate.execute(&cancel, move |_| async move {
                    started.notify_one();
                    proceed.notified().await;
                    let _ = done_tx.send(());
                    Ok(7)
                })
                .await
            })
        };

        started.notified().await;
        cancel.cancel();
        let result = call.await.unwrap();
        assert!(matches!(result, Err(StoreError::Cancelled)));

        // Slot stays held until the operation actually finishes
        assert_eq!(gate.available(), 0);
        proceed.notify_one();
        done_rx.await.unwrap();
        while gate.available() < 1 {
            tokio::task::yield_now().await;
        }
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_runs() {
        let gate = StorageGate::new((), 4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_op = ran.clone();
        let result = gate
            .execute(&cancel, move |_| async move {
                ran_in_op.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(StoreError::Cancelled)));
        tokio::task::yield_now().await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_closed_gate_is_unavailable() {
        let gate = StorageGate::new((), 2);
        gate.close();

        let result: Result<(), _> = gate
            .execute(&CancellationToken::new(), |_| async { Ok(()) })
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
