use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::{
    core::{RegistryError, Result},
    registry::{NotifyFilter, RegistryBackend, RegistryKey, STATUS_SUCCESS},
    signal::{ManualResetEvent, wait_for_signal},
};

use super::dedicated::{DedicatedThreadLease, DedicatedThreadPool};

/// Arms one-shot change notifications on a key.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Arms a notification for changes matching `filter` on `key` (and its
    /// descendants, with `watch_subtree`).
    ///
    /// # Errors
    /// Returns `RegistryError::Platform` with the store's status code if the
    /// request is rejected, or `RegistryError::DedicatedThread` if the
    /// arming thread could not be used.
    async fn subscribe(
        &self,
        key: Arc<dyn RegistryKey>,
        watch_subtree: bool,
        filter: NotifyFilter,
    ) -> Result<Subscription>;

    /// Whether subscriptions survive the thread that armed them.
    fn is_thread_agnostic(&self) -> bool;
}

/// An armed notification.
///
/// For subscriptions armed on the dedicated thread, the thread is kept
/// alive until this value is dropped.
#[derive(Debug)]
pub struct Subscription {
    event: ManualResetEvent,
    lease: Option<DedicatedThreadLease>,
}

impl Subscription {
    /// Waits for the change to fire.
    ///
    /// Returns `Ok(false)` if `timeout` elapses first; `None` waits
    /// indefinitely.
    ///
    /// # Errors
    /// Returns `RegistryError::Cancelled` if `cancel` fires before the change.
    pub async fn changed(
        &self,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool> {
        wait_for_signal(&self.event, timeout, cancel).await
    }

    /// Whether the change has already fired.
    pub fn is_signaled(&self) -> bool {
        self.event.is_set()
    }

    /// Whether this subscription pins the dedicated thread.
    pub fn holds_dedicated_thread(&self) -> bool {
        self.lease.is_some()
    }
}

/// Arms notifications directly from the calling thread.
///
/// Only valid for backends that honour [`NotifyFilter::THREAD_AGNOSTIC`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadAgnosticNotifier;

#[async_trait]
impl ChangeNotifier for ThreadAgnosticNotifier {
    #[instrument(skip(self, key), fields(key = %key.name()))]
    async fn subscribe(
        &self,
        key: Arc<dyn RegistryKey>,
        watch_subtree: bool,
        filter: NotifyFilter,
    ) -> Result<Subscription> {
        let event = ManualResetEvent::new();
        arm(
            key.as_ref(),
            watch_subtree,
            filter | NotifyFilter::THREAD_AGNOSTIC,
            &event,
        )?;

        Ok(Subscription { event, lease: None })
    }

    fn is_thread_agnostic(&self) -> bool {
        true
    }
}

/// Arms notifications from the [`DedicatedThreadPool`] worker so they stay
/// valid on stores that cancel them when the arming thread exits.
#[derive(Clone, Default)]
pub struct DedicatedThreadNotifier {
    pool: DedicatedThreadPool,
}

impl DedicatedThreadNotifier {
    /// Arms through `pool`.
    pub fn new(pool: DedicatedThreadPool) -> Self {
        Self { pool }
    }

    /// The pool whose worker issues the requests.
    pub fn pool(&self) -> &DedicatedThreadPool {
        &self.pool
    }
}

#[async_trait]
impl ChangeNotifier for DedicatedThreadNotifier {
    #[instrument(skip(self, key), fields(key = %key.name()))]
    async fn subscribe(
        &self,
        key: Arc<dyn RegistryKey>,
        watch_subtree: bool,
        filter: NotifyFilter,
    ) -> Result<Subscription> {
        let event = ManualResetEvent::new();
        let armed = event.clone();
        let kinds = filter.change_kinds();

        let lease = self
            .pool
            .run_on_dedicated_thread(move || arm(key.as_ref(), watch_subtree, kinds, &armed))
            .await?;

        Ok(Subscription {
            event,
            lease: Some(lease),
        })
    }

    fn is_thread_agnostic(&self) -> bool {
        false
    }
}

/// Picks the notifier suited to `backend`.
pub fn select_notifier(
    backend: &dyn RegistryBackend,
    pool: &DedicatedThreadPool,
) -> Arc<dyn ChangeNotifier> {
    if backend.supports_thread_agnostic_notify() {
        Arc::new(ThreadAgnosticNotifier)
    } else {
        debug!("Backend lacks thread-agnostic notifications, using dedicated thread");
        Arc::new(DedicatedThreadNotifier::new(pool.clone()))
    }
}

fn arm(
    key: &dyn RegistryKey,
    watch_subtree: bool,
    filter: NotifyFilter,
    event: &ManualResetEvent,
) -> Result<()> {
    match key.notify_change_key_value(watch_subtree, filter, event) {
        STATUS_SUCCESS => Ok(()),
        code => Err(RegistryError::Platform { code }),
    }
}
