use std::{
    sync::{
        Arc, Condvar, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::oneshot;

/// A manually reset event object.
///
/// Once [`set`](Self::set) it stays signaled until [`reset`](Self::reset).
/// Blocking threads wait through a condition variable; async callers go
/// through [`register_wait`](Self::register_wait), which behaves like a
/// thread-pool wait registration that fires at most once.
#[derive(Clone, Default)]
pub struct ManualResetEvent {
    inner: Arc<EventInner>,
}

#[derive(Default)]
struct EventInner {
    signaled: AtomicBool,
    waits: Mutex<WaitList>,
    wake: Condvar,
}

#[derive(Default)]
struct WaitList {
    next_id: u64,
    pending: Vec<(u64, oneshot::Sender<()>)>,
}

impl ManualResetEvent {
    /// Creates an event in the non-signaled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals the event, firing every registered wait.
    pub fn set(&self) {
        let mut waits = self.inner.lock();
        self.inner.signaled.store(true, Ordering::Release);

        for (_, sender) in waits.pending.drain(..) {
            let _ = sender.send(());
        }

        self.inner.wake.notify_all();
    }

    /// Returns the event to the non-signaled state.
    pub fn reset(&self) {
        let _waits = self.inner.lock();
        self.inner.signaled.store(false, Ordering::Release);
    }

    /// Non-blocking poll of the signaled state.
    ///
    /// A plain atomic load: it never parks, never yields to the executor and
    /// cannot run any other work while it executes.
    pub fn is_set(&self) -> bool {
        self.inner.signaled.load(Ordering::Acquire)
    }

    /// Blocks the current thread until the event is set or `timeout` elapses.
    ///
    /// Returns `true` if the event was signaled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let waits = self.inner.lock();
        let result = self
            .inner
            .wake
            .wait_timeout_while(waits, timeout, |_| {
                !self.inner.signaled.load(Ordering::Acquire)
            });

        match result {
            Ok((_guard, status)) => !status.timed_out(),
            Err(poisoned) => !poisoned.into_inner().1.timed_out(),
        }
    }

    /// Registers a one-shot wait on this event.
    ///
    /// The registration fires the next time the event is set, or immediately
    /// if it already is, and then unregisters itself.
    pub fn register_wait(&self) -> RegisteredWait {
        let (sender, receiver) = oneshot::channel();
        let mut waits = self.inner.lock();

        if self.is_set() {
            let _ = sender.send(());
            return RegisteredWait {
                id: None,
                receiver,
                event: self.clone(),
            };
        }

        let id = waits.next_id;
        waits.next_id += 1;
        waits.pending.push((id, sender));

        RegisteredWait {
            id: Some(id),
            receiver,
            event: self.clone(),
        }
    }

    /// Number of async waits currently registered and not yet fired.
    pub fn registered_waits(&self) -> usize {
        self.inner.lock().pending.len()
    }

    fn unregister(&self, id: u64) {
        self.inner.lock().pending.retain(|(pending, _)| *pending != id);
    }
}

impl EventInner {
    fn lock(&self) -> MutexGuard<'_, WaitList> {
        match self.waits.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for ManualResetEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualResetEvent")
            .field("signaled", &self.is_set())
            .finish()
    }
}

/// A one-shot wait registered on a [`ManualResetEvent`].
///
/// The registration is released exactly once: when it fires, when
/// [`unregister`](Self::unregister) is called, or when it is dropped.
pub struct RegisteredWait {
    id: Option<u64>,
    receiver: oneshot::Receiver<()>,
    event: ManualResetEvent,
}

impl RegisteredWait {
    /// Waits for the registration to fire, up to `timeout` if given.
    ///
    /// Returns `true` if the event was signaled, `false` on timeout.
    pub async fn fired(&mut self, timeout: Option<Duration>) -> bool {
        let fired = match timeout {
            None => (&mut self.receiver).await.is_ok(),
            Some(limit) => matches!(
                tokio::time::timeout(limit, &mut self.receiver).await,
                Ok(Ok(()))
            ),
        };

        if fired {
            // set() already drained us from the wait list
            self.id = None;
        }

        fired
    }

    /// Whether the registration still occupies a slot on the event.
    pub fn is_registered(&self) -> bool {
        self.id.is_some()
    }

    /// Releases the registration if it has not fired yet.
    pub fn unregister(&mut self) {
        if let Some(id) = self.id.take() {
            self.event.unregister(id);
        }
    }
}

impl Drop for RegisteredWait {
    fn drop(&mut self) {
        self.unregister();
    }
}
