use std::{
    sync::{
        Arc, Mutex, MutexGuard, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Instant,
};

use futures::{Stream, StreamExt};
use tokio::{runtime::Handle, sync::broadcast, task::JoinHandle};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    core::{RegistryError, Result},
    registry::{NotifyFilter, RegistryBackend, RegistryKey},
    watch::{ChangeNotifier, DedicatedThreadPool, select_notifier},
};

use super::{
    config_map::ConfigMap,
    events::ReloadEvent,
    options::{LoadExceptionContext, LoadStep, RegistryConfigOptions},
    path::path_matches,
    walker::TreeWalker,
};

const RELOAD_CHANNEL_CAPACITY: usize = 64;

/// Live configuration read from a registry subtree.
///
/// `load()` reads the subtree once. With `reload_on_change` it also starts
/// a background task that waits for a change anywhere below the root,
/// pauses for the reload delay, re-reads, swaps in the new data and raises
/// a [`ReloadEvent`]. Readers always see a complete snapshot.
///
/// Dropping the provider stops the background task.
pub struct RegistryConfigProvider {
    shared: Arc<ProviderShared>,
    watch: Mutex<Option<WatchTask>>,
    disposed: AtomicBool,
}

struct ProviderShared {
    options: RegistryConfigOptions,
    backend: Arc<dyn RegistryBackend>,
    notifier: Arc<dyn ChangeNotifier>,
    data: RwLock<Arc<ConfigMap>>,
    reload_sender: broadcast::Sender<ReloadEvent>,
    sequence: AtomicU64,
}

struct WatchTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RegistryConfigProvider {
    /// Creates a provider, choosing the notifier from the backend's
    /// capabilities and the process-wide [`DedicatedThreadPool`].
    ///
    /// # Errors
    /// Returns `RegistryError::InvalidArgument` or
    /// `RegistryError::UnsupportedHive` if the options are invalid.
    pub fn new(options: RegistryConfigOptions, backend: Arc<dyn RegistryBackend>) -> Result<Self> {
        let notifier = select_notifier(backend.as_ref(), DedicatedThreadPool::shared());
        Self::with_notifier(options, backend, notifier)
    }

    /// Creates a provider that arms notifications through `notifier`.
    ///
    /// # Errors
    /// Returns `RegistryError::InvalidArgument` or
    /// `RegistryError::UnsupportedHive` if the options are invalid.
    pub fn with_notifier(
        options: RegistryConfigOptions,
        backend: Arc<dyn RegistryBackend>,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Result<Self> {
        options.validate()?;
        let (reload_sender, _) = broadcast::channel(RELOAD_CHANNEL_CAPACITY);

        Ok(Self {
            shared: Arc::new(ProviderShared {
                options,
                backend,
                notifier,
                data: RwLock::new(Arc::new(ConfigMap::new())),
                reload_sender,
                sequence: AtomicU64::new(0),
            }),
            watch: Mutex::new(None),
            disposed: AtomicBool::new(false),
        })
    }

    /// The options this provider was built with.
    pub fn options(&self) -> &RegistryConfigOptions {
        &self.shared.options
    }

    /// Reads the subtree and, if configured, starts watching it.
    ///
    /// A failure is passed to the load exception hook; if the hook leaves it
    /// suppressed the data is cleared and loading succeeds. Calling `load()`
    /// again re-reads the subtree but never starts a second watch task, nor
    /// restarts one that has stopped.
    ///
    /// # Errors
    /// Returns the load failure when it is not suppressed, or
    /// `RegistryError::RuntimeUnavailable` if watching was requested outside
    /// a Tokio runtime.
    #[instrument(skip(self), fields(hive = %self.shared.options.hive, root_key = %self.shared.options.root_key))]
    pub fn load(&self) -> Result<()> {
        match self.shared.walk() {
            Ok(data) => {
                info!(entries = data.len(), "Loaded registry configuration");
                self.shared.replace(data);
            }
            Err(error) => {
                self.shared.handle_exception(LoadStep::InitialLoad, error)?;
                self.shared.replace(ConfigMap::new());
            }
        }

        if self.shared.options.reload_on_change {
            self.start_watching()?;
        }

        Ok(())
    }

    /// Value at `path`, case-insensitively. `None` if absent or null.
    pub fn get(&self, path: &str) -> Option<String> {
        self.snapshot().get(path).map(str::to_string)
    }

    /// Like [`get`](Self::get) but tells a null value (`Some(None)`) apart
    /// from a missing one.
    pub fn try_get(&self, path: &str) -> Option<Option<String>> {
        self.snapshot()
            .get_entry(path)
            .map(|value| value.map(str::to_string))
    }

    /// The current data. Later reloads do not affect the returned map.
    pub fn snapshot(&self) -> Arc<ConfigMap> {
        match self.shared.data.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Receives every subsequent [`ReloadEvent`].
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.shared.reload_sender.subscribe()
    }

    /// Stream of subsequent reloads. Events missed by a slow consumer are
    /// skipped.
    pub fn reloads(&self) -> impl Stream<Item = ReloadEvent> + use<> {
        BroadcastStream::new(self.subscribe()).filter_map(|event| async move { event.ok() })
    }

    /// Stream of reloads that changed at least one path matching `pattern`
    /// (supports `*` wildcards).
    pub fn reloads_matching(&self, pattern: &str) -> impl Stream<Item = ReloadEvent> + use<> {
        let pattern = pattern.to_string();
        let receiver = self.subscribe();

        futures::stream::unfold(receiver, move |mut receiver| {
            let pattern = pattern.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            if event
                                .changed_paths
                                .iter()
                                .any(|path| path_matches(path, &pattern))
                            {
                                return Some((event, receiver));
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        })
    }

    /// Whether the background watch task is running.
    pub fn is_watching(&self) -> bool {
        !self.disposed.load(Ordering::Acquire)
            && self
                .lock_watch()
                .as_ref()
                .is_some_and(|task| !task.handle.is_finished())
    }

    /// Stops the background task. Safe to call repeatedly.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(task) = self.lock_watch().as_ref() {
            debug!(root_key = %self.shared.options.root_key, "Stopping registry watch");
            task.cancel.cancel();
        }
    }

    /// Stops the background task and waits for it to release everything it
    /// holds.
    pub async fn shutdown(&self) {
        self.disposed.store(true, Ordering::Release);
        let task = self.lock_watch().take();

        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Registry watch task ended abnormally");
            }
        }
    }

    fn start_watching(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Ok(());
        }

        // a finished task stays in the slot, so a source that stopped
        // watching never starts again
        let mut watch = self.lock_watch();
        if watch.is_some() {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|_| RegistryError::RuntimeUnavailable)?;
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(watch_loop(Arc::clone(&self.shared), cancel.clone()));

        *watch = Some(WatchTask { cancel, handle });
        Ok(())
    }

    fn lock_watch(&self) -> MutexGuard<'_, Option<WatchTask>> {
        match self.watch.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for RegistryConfigProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for RegistryConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfigProvider")
            .field("options", &self.shared.options)
            .field("watching", &self.is_watching())
            .finish()
    }
}

impl ProviderShared {
    fn walk(&self) -> Result<ConfigMap> {
        TreeWalker::new(
            self.backend.as_ref(),
            self.options.hive,
            &self.options.root_key,
            self.options.optional,
        )
        .walk()
    }

    fn replace(&self, data: ConfigMap) -> Arc<ConfigMap> {
        let data = Arc::new(data);
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, data)
    }

    fn publish(&self, data: ConfigMap, succeeded: bool) {
        let changed_paths = self.replace(data.clone()).changed_paths(&data);

        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(sequence, succeeded, changed = changed_paths.len(), "Registry data reloaded");

        let _ = self.reload_sender.send(ReloadEvent {
            sequence,
            changed_paths,
            succeeded,
            timestamp: Instant::now(),
        });
    }

    /// Runs the load exception hook. `Ok` means the failure was suppressed.
    fn handle_exception(&self, step: LoadStep, error: RegistryError) -> Result<()> {
        let ignore = {
            let mut context = LoadExceptionContext {
                step,
                hive: self.options.hive,
                root_key: &self.options.root_key,
                error: &error,
                ignore: self.options.optional,
            };

            if let Some(handler) = &self.options.on_load_exception {
                handler(&mut context);
            }

            context.ignore
        };

        if ignore {
            warn!(?step, error = %error, "Suppressed registry load failure");
            Ok(())
        } else {
            Err(error)
        }
    }

    fn open_watch_root(&self) -> Result<Arc<dyn RegistryKey>> {
        let root = self
            .backend
            .open_root(self.options.hive, &self.options.root_key, false)?
            .ok_or_else(|| RegistryError::WatchRootUnavailable {
                path: self.options.root_key.clone(),
            })?;

        Ok(Arc::from(root))
    }

    async fn wait_and_reload(
        self: &Arc<Self>,
        root: &Arc<dyn RegistryKey>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let subscription = self
            .notifier
            .subscribe(Arc::clone(root), true, NotifyFilter::RELOAD)
            .await?;

        subscription.changed(None, Some(cancel)).await?;
        drop(subscription);

        self.settle(cancel).await?;

        let data = self.walk_blocking().await?;
        self.publish(data, true);
        Ok(())
    }

    /// Re-reads the subtree on the blocking pool; store reads may hit disk.
    async fn walk_blocking(self: &Arc<Self>) -> Result<ConfigMap> {
        let shared = Arc::clone(self);
        tokio::task::spawn_blocking(move || shared.walk())
            .await
            .map_err(|e| RegistryError::WalkTask {
                details: e.to_string(),
            })?
    }

    async fn settle(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RegistryError::Cancelled),
            () = tokio::time::sleep(self.options.reload_delay) => Ok(()),
        }
    }
}

#[instrument(skip_all, fields(hive = %shared.options.hive, root_key = %shared.options.root_key))]
async fn watch_loop(shared: Arc<ProviderShared>, cancel: CancellationToken) {
    let root = match shared.open_watch_root() {
        Ok(root) => root,
        Err(error) => {
            if let Err(error) = shared.handle_exception(LoadStep::OpenWatchRoot, error) {
                error!(error = %error, "Cannot watch registry key, reloads disabled");
            }
            return;
        }
    };

    info!("Watching registry key for changes");

    while !cancel.is_cancelled() {
        let error = match shared.wait_and_reload(&root, &cancel).await {
            Ok(()) => continue,
            Err(RegistryError::Cancelled) => break,
            Err(error) => error,
        };

        shared.publish(ConfigMap::new(), false);

        let error = RegistryError::Reload {
            path: shared.options.root_key.clone(),
            source: Box::new(error),
        };

        if let Err(error) = shared.handle_exception(LoadStep::Reload, error) {
            error!(error = %error, "Registry reload failed, stopping watch");
            break;
        }

        // back off before re-arming so a persistent failure cannot spin
        if shared.settle(&cancel).await.is_err() {
            break;
        }
    }

    debug!("Registry watch stopped");
}
