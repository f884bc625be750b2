//! Bounded, paced dispatch queue for outbound analysis requests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Limits applied by a [`RequestDispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Jobs allowed to execute at the same time.
    pub max_concurrent: usize,
    /// Pause between admissions once jobs are waiting in the queue.
    pub inter_dispatch_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            inter_dispatch_delay: Duration::from_millis(100),
        }
    }
}

/// FIFO request queue with a concurrency bound.
///
/// Jobs start in enqueue order. While a slot is free and nobody is waiting a
/// job starts immediately; once jobs are queued, each further admission is
/// separated from the previous one by `inter_dispatch_delay`. A job failing,
/// panicking or being dropped frees its slot without affecting siblings.
///
/// Cloning is cheap and every clone shares the same queue.
#[derive(Clone)]
pub struct RequestDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    config: DispatcherConfig,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    active: usize,
    waiters: VecDeque<oneshot::Sender<Slot>>,
    pacing: bool,
    dispatched: u64,
}

impl QueueState {
    /// Forget waiters whose caller was dropped.
    fn prune(&mut self) {
        self.waiters.retain(|waiter| !waiter.is_closed());
    }
}

/// One occupied concurrency slot; frees itself on drop.
struct Slot {
    inner: Arc<DispatcherInner>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        DispatcherInner::release(&self.inner);
    }
}

impl RequestDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        let config = DispatcherConfig {
            max_concurrent: config.max_concurrent.max(1),
            ..config
        };
        Self {
            inner: Arc::new(DispatcherInner {
                config,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    pub fn config(&self) -> DispatcherConfig {
        self.inner.config
    }

    /// Jobs currently executing.
    pub fn active(&self) -> usize {
        self.inner.state.lock().active
    }

    /// Jobs waiting for a slot. Callers that gave up are not counted.
    pub fn queued(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.prune();
        state.waiters.len()
    }

    /// Total jobs admitted since construction.
    pub fn dispatched(&self) -> u64 {
        self.inner.state.lock().dispatched
    }

    /// Run `job` once a slot is available and return its output.
    ///
    /// The job is not constructed until it is admitted, so a job queued
    /// behind a burst does no work while it waits.
    pub async fn enqueue<F, Fut, R>(&self, job: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let slot = self.acquire().await;
        let output = job().await;
        drop(slot);
        output
    }

    /// Like [`enqueue`](Self::enqueue), but leaves the queue when `cancel`
    /// fires before a slot is granted. Returns `None` in that case.
    pub async fn enqueue_unless_cancelled<F, Fut, R>(
        &self,
        cancel: &CancellationToken,
        job: F,
    ) -> Option<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::trace!("dispatcher.withdrawn");
                return None;
            }
            slot = self.acquire() => slot,
        };
        let output = job().await;
        drop(slot);
        Some(output)
    }

    async fn acquire(&self) -> Slot {
        let max = self.inner.config.max_concurrent;
        loop {
            let rx = {
                let mut state = self.inner.state.lock();
                state.prune();
                if state.active < max && state.waiters.is_empty() {
                    state.active += 1;
                    state.dispatched += 1;
                    tracing::trace!(active = state.active, "dispatcher.admit");
                    return Slot {
                        inner: Arc::clone(&self.inner),
                    };
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                tracing::trace!(
                    active = state.active,
                    queued = state.waiters.len(),
                    "dispatcher.enqueue"
                );
                rx
            };

            if let Ok(slot) = rx.await {
                return slot;
            }
        }
    }
}

impl DispatcherInner {
    fn release(self: &Arc<Self>) {
        let start_pacer = {
            let mut state = self.state.lock();
            state.active = state.active.saturating_sub(1);
            state.prune();
            if !state.waiters.is_empty() && !state.pacing {
                state.pacing = true;
                true
            } else {
                false
            }
        };

        if start_pacer {
            let inner = Arc::clone(self);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(inner.pace());
                }
                Err(_) => {
                    // No runtime left to sleep on; hand slots out directly.
                    while inner.admit_next() {}
                }
            }
        }
    }

    async fn pace(self: Arc<Self>) {
        loop {
            let delay = self.config.inter_dispatch_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if !self.admit_next() {
                break;
            }
        }
    }

    /// Hand a slot to the oldest live waiter. Returns whether pacing should continue.
    fn admit_next(self: &Arc<Self>) -> bool {
        let max = self.config.max_concurrent;
        loop {
            let waiter = {
                let mut state = self.state.lock();
                if state.active >= max {
                    state.pacing = false;
                    return false;
                }
                let Some(waiter) = state.waiters.pop_front() else {
                    state.pacing = false;
                    return false;
                };
                state.active += 1;
                waiter
            };

            let slot = Slot {
                inner: Arc::clone(self),
            };
            match waiter.send(slot) {
                Ok(()) => {
                    let mut state = self.state.lock();
                    state.dispatched += 1;
                    state.prune();
                    tracing::trace!(
                        active = state.active,
                        queued = state.waiters.len(),
                        "dispatcher.admit_paced"
                    );
                    if state.waiters.is_empty() || state.active >= max {
                        state.pacing = false;
                        return false;
                    }
                    return true;
                }
                // Waiter gave up before admission; its slot is released on
                // drop and the next waiter is tried without delay.
                Err(slot) => drop(slot),
            }
        }
    }
}
