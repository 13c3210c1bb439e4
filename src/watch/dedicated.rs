use std::{
    any::Any,
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock},
    thread,
};

use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::core::{RegistryError, Result};

/// Name given to every dedicated worker thread.
pub const WORKER_THREAD_NAME: &str = "registry-watcher";

/// Stack size of the dedicated worker; it only issues short store calls.
pub const WORKER_STACK_SIZE: usize = 100 * 1024;

type Work = Box<dyn FnOnce() -> Result<()> + Send>;

static SHARED_POOL: OnceLock<DedicatedThreadPool> = OnceLock::new();

struct WorkItem {
    action: Work,
    reply: oneshot::Sender<Result<()>>,
}

#[derive(Default)]
struct PoolState {
    pending: VecDeque<WorkItem>,
    keep_alive: usize,
    live_worker: Option<u64>,
    next_generation: u64,
}

#[derive(Default)]
struct PoolShared {
    state: Mutex<PoolState>,
    wake: Condvar,
}

/// A single long-lived thread for work whose effects are tied to the
/// lifetime of the thread that performed it.
///
/// The thread is spawned when the first caller registers interest and is
/// told to exit when the last [`DedicatedThreadLease`] is released. At most
/// one worker is recognised at a time; a worker from an earlier generation
/// that wakes up after a restart exits without touching the queue.
///
/// Use [`shared`](Self::shared) for the process-wide instance, or
/// [`new`](Self::new) for an isolated one.
#[derive(Clone, Default)]
pub struct DedicatedThreadPool {
    shared: Arc<PoolShared>,
}

impl DedicatedThreadPool {
    /// Creates an independent pool with no worker running.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide pool shared by every watcher.
    pub fn shared() -> &'static DedicatedThreadPool {
        SHARED_POOL.get_or_init(DedicatedThreadPool::new)
    }

    /// Number of outstanding interest claims.
    pub fn keep_alive_count(&self) -> usize {
        self.shared.lock().keep_alive
    }

    /// Whether a worker is currently recognised as the live one.
    pub fn has_live_worker(&self) -> bool {
        self.shared.lock().live_worker.is_some()
    }

    /// Runs `action` on the dedicated thread and waits for it to finish.
    ///
    /// On success the returned lease keeps the thread alive until it is
    /// dropped. If `action` fails or panics, the claim taken on the
    /// caller's behalf is released before the error is returned. Dropping
    /// the returned future before completion releases the claim as well.
    ///
    /// # Errors
    /// Returns the error produced by `action`, or
    /// `RegistryError::DedicatedThread` if the worker could not be spawned
    /// or `action` panicked.
    pub async fn run_on_dedicated_thread<F>(&self, action: F) -> Result<DedicatedThreadLease>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let (reply, outcome) = oneshot::channel();
        let claim = self.enqueue(Box::new(action), reply)?;

        match outcome.await {
            Ok(Ok(())) => Ok(claim.into_lease()),
            Ok(Err(error)) => Err(error),
            Err(_) => Err(RegistryError::DedicatedThread {
                details: "worker exited before running the request".to_string(),
            }),
        }
    }

    fn enqueue(&self, action: Work, reply: oneshot::Sender<Result<()>>) -> Result<PendingClaim> {
        let mut state = self.shared.lock();

        // queue entry and claim are taken together so neither can be orphaned
        state.pending.push_back(WorkItem { action, reply });
        state.keep_alive += 1;

        if state.keep_alive == 1 {
            let generation = state.next_generation;
            state.next_generation += 1;
            state.live_worker = Some(generation);

            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(WORKER_THREAD_NAME.to_string())
                .stack_size(WORKER_STACK_SIZE)
                .spawn(move || worker_loop(&shared, generation));

            if let Err(e) = spawned {
                state.pending.pop_back();
                state.keep_alive -= 1;
                state.live_worker = None;
                return Err(RegistryError::DedicatedThread {
                    details: format!("failed to spawn worker thread: {e}"),
                });
            }

            debug!(generation, "Spawned dedicated watcher thread");
        } else {
            // a retiring worker may still be parked; wake them all so the
            // live one sees the new item
            self.shared.wake.notify_all();
        }

        Ok(PendingClaim {
            shared: Some(Arc::clone(&self.shared)),
        })
    }
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn release(&self) {
        let mut state = self.lock();
        state.keep_alive = state.keep_alive.saturating_sub(1);

        if state.keep_alive == 0 {
            state.live_worker = None;
            // anything still queued belongs to callers that gave up waiting
            state.pending.clear();
            self.wake.notify_all();
        }
    }
}

fn worker_loop(shared: &PoolShared, generation: u64) {
    loop {
        let work = {
            let mut state = shared.lock();
            loop {
                if state.live_worker != Some(generation) {
                    trace!(generation, "Retired watcher thread exiting");
                    return;
                }

                if let Some(item) = state.pending.pop_front() {
                    break item;
                }

                if state.keep_alive == 0 {
                    trace!(generation, "Idle watcher thread exiting");
                    return;
                }

                state = match shared.wake.wait(state) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
        };

        let WorkItem { action, reply } = work;
        if reply.is_closed() {
            continue;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(action)).unwrap_or_else(|payload| {
            let details = panic_message(payload.as_ref());
            warn!(generation, %details, "Dedicated thread work panicked");
            Err(RegistryError::DedicatedThread { details })
        });

        let _ = reply.send(outcome);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "work item panicked".to_string()
    }
}

/// Interest claim held while a request is queued or running.
struct PendingClaim {
    shared: Option<Arc<PoolShared>>,
}

impl PendingClaim {
    fn into_lease(mut self) -> DedicatedThreadLease {
        DedicatedThreadLease {
            shared: self.shared.take(),
        }
    }
}

impl Drop for PendingClaim {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.release();
        }
    }
}

/// Keeps the dedicated thread alive. Released once, on drop.
pub struct DedicatedThreadLease {
    shared: Option<Arc<PoolShared>>,
}

impl DedicatedThreadLease {
    /// Releases the claim now rather than at end of scope.
    pub fn release(mut self) {
        if let Some(shared) = self.shared.take() {
            shared.release();
        }
    }
}

impl Drop for DedicatedThreadLease {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.release();
        }
    }
}

impl std::fmt::Debug for DedicatedThreadLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedicatedThreadLease")
            .field("active", &self.shared.is_some())
            .finish()
    }
}
