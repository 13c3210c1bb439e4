use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Arc, Mutex, MutexGuard, Weak,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use tracing::trace;

use crate::{
    core::{RegistryError, Result},
    signal::ManualResetEvent,
};

use super::{
    Hive, NotifyFilter, RegistryBackend, RegistryKey, STATUS_SUCCESS, join_key_path,
    split_key_path,
};

/// Status returned when a notification request carries flags the backend
/// cannot honour.
pub const STATUS_INVALID_PARAMETER: u32 = 87;

/// Status returned when the key behind a handle no longer exists.
pub const STATUS_KEY_DELETED: u32 = 1018;

/// Marker owned by a thread-local; it is dropped when its thread exits.
struct ThreadLifetime;

thread_local! {
    static THREAD_LIFETIME: Arc<ThreadLifetime> = Arc::new(ThreadLifetime);
}

fn current_thread_lifetime() -> Weak<ThreadLifetime> {
    THREAD_LIFETIME.with(Arc::downgrade)
}

/// An in-process registry tree.
///
/// Cloning yields another handle to the same tree. Besides the read-only
/// [`RegistryBackend`] surface used by the provider, it exposes mutators
/// for fixtures, failure injection and counters for leak checks.
///
/// Notifications fire only for changes made after they were armed, once.
/// Requests without [`NotifyFilter::THREAD_AGNOSTIC`] are bound to the
/// arming thread: if that thread exits first the notification is dropped.
#[derive(Clone)]
pub struct MemoryRegistry {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    thread_agnostic: bool,
    next_handle: AtomicU64,
    open_handles: AtomicUsize,
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    hives: HashMap<Hive, Node>,
    watches: Vec<Watch>,
    denied: HashSet<(Hive, String)>,
    fail_next_notify: Option<u32>,
    notify_calls: usize,
}

#[derive(Default)]
struct Node {
    name: String,
    values: BTreeMap<String, (String, Option<String>)>,
    children: BTreeMap<String, Node>,
}

struct Watch {
    handle: u64,
    hive: Hive,
    path: Vec<String>,
    subtree: bool,
    filter: NotifyFilter,
    event: ManualResetEvent,
    owner: Option<Weak<ThreadLifetime>>,
}

impl Watch {
    fn is_orphaned(&self) -> bool {
        self.owner
            .as_ref()
            .is_some_and(|owner| owner.upgrade().is_none())
    }

    fn covers(&self, hive: Hive, path: &[String], kind: NotifyFilter) -> bool {
        if self.hive != hive || !self.filter.intersects(kind) {
            return false;
        }

        if self.subtree {
            path.starts_with(&self.path)
        } else {
            path == self.path.as_slice()
        }
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

fn fold_path(path: &str) -> Vec<String> {
    split_key_path(path).into_iter().map(fold).collect()
}

impl Node {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn find(&self, folded: &[String]) -> Option<&Node> {
        folded
            .iter()
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    fn find_mut(&mut self, folded: &[String]) -> Option<&mut Node> {
        folded
            .iter()
            .try_fold(self, |node, segment| node.children.get_mut(segment))
    }
}

impl MemoryRegistry {
    /// Creates an empty registry whose notifications may be armed from any
    /// thread.
    pub fn new() -> Self {
        Self::with_thread_agnostic_support(true)
    }

    /// Creates an empty registry that, like older platforms, rejects
    /// [`NotifyFilter::THREAD_AGNOSTIC`] and binds every notification to
    /// the thread that armed it.
    pub fn downlevel() -> Self {
        Self::with_thread_agnostic_support(false)
    }

    fn with_thread_agnostic_support(thread_agnostic: bool) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                thread_agnostic,
                next_handle: AtomicU64::new(1),
                open_handles: AtomicUsize::new(0),
                state: Mutex::new(MemoryState::default()),
            }),
        }
    }

    /// Creates `path` (and any missing parents).
    pub fn create_key(&self, hive: Hive, path: &str) {
        let mut state = self.inner.lock();
        let segments = split_key_path(path);
        let root = state.hives.entry(hive).or_default();
        let mut node = root;
        let mut created_at: Option<Vec<String>> = None;
        let mut walked: Vec<String> = Vec::new();

        for segment in segments {
            let folded = fold(segment);
            if !node.children.contains_key(&folded) && created_at.is_none() {
                created_at = Some(walked.clone());
            }
            node = node
                .children
                .entry(folded.clone())
                .or_insert_with(|| Node::named(segment));
            walked.push(folded);
        }

        if let Some(parent) = created_at {
            state.notify(hive, &parent, NotifyFilter::SUBKEY);
        }
    }

    /// Sets `name` on key `path` to `value`, creating the key if needed.
    ///
    /// An empty `name` sets the key's unnamed (default) value.
    pub fn set_value(&self, hive: Hive, path: &str, name: &str, value: impl Into<String>) {
        self.store_value(hive, path, name, Some(value.into()));
    }

    /// Stores a value that exists but carries no data.
    pub fn set_null_value(&self, hive: Hive, path: &str, name: &str) {
        self.store_value(hive, path, name, None);
    }

    fn store_value(&self, hive: Hive, path: &str, name: &str, value: Option<String>) {
        self.create_key(hive, path);

        let mut state = self.inner.lock();
        let folded = fold_path(path);
        if let Some(node) = state
            .hives
            .get_mut(&hive)
            .and_then(|root| root.find_mut(&folded))
        {
            node.values
                .insert(fold(name), (name.to_string(), value));
        }
        state.notify(hive, &folded, NotifyFilter::VALUE);
    }

    /// Removes value `name` from key `path`. Returns whether it existed.
    pub fn delete_value(&self, hive: Hive, path: &str, name: &str) -> bool {
        let mut state = self.inner.lock();
        let folded = fold_path(path);
        let removed = state
            .hives
            .get_mut(&hive)
            .and_then(|root| root.find_mut(&folded))
            .and_then(|node| node.values.remove(&fold(name)))
            .is_some();

        if removed {
            state.notify(hive, &folded, NotifyFilter::VALUE);
        }
        removed
    }

    /// Removes key `path` and everything below it. Returns whether it existed.
    pub fn delete_key(&self, hive: Hive, path: &str) -> bool {
        let mut state = self.inner.lock();
        let folded = fold_path(path);
        let Some((last, parent)) = folded.split_last() else {
            return false;
        };

        let removed = state
            .hives
            .get_mut(&hive)
            .and_then(|root| root.find_mut(parent))
            .and_then(|node| node.children.remove(last))
            .is_some();

        if removed {
            state.notify(hive, parent, NotifyFilter::SUBKEY);
            state.notify(hive, &folded, NotifyFilter::all());
        }
        removed
    }

    /// Makes every read of key `path` fail with an access error.
    pub fn deny_access(&self, hive: Hive, path: &str) {
        let folded = fold_path(path).join("\\");
        self.inner.lock().denied.insert((hive, folded));
    }

    /// Lifts a previous [`deny_access`](Self::deny_access).
    pub fn allow_access(&self, hive: Hive, path: &str) {
        let folded = fold_path(path).join("\\");
        self.inner.lock().denied.remove(&(hive, folded));
    }

    /// Makes the next notification request return `status`.
    pub fn fail_next_notification(&self, status: u32) {
        self.inner.lock().fail_next_notify = Some(status);
    }

    /// Armed notifications that can still fire.
    pub fn pending_notifications(&self) -> usize {
        let mut state = self.inner.lock();
        state.watches.retain(|watch| !watch.is_orphaned());
        state.watches.len()
    }

    /// Total notification requests received, successful or not.
    pub fn notification_requests(&self) -> usize {
        self.inner.lock().notify_calls
    }

    /// Key handles that have been opened and not yet dropped.
    pub fn open_handles(&self) -> usize {
        self.inner.open_handles.load(Ordering::Acquire)
    }

    fn open(&self, hive: Hive, display: String, folded: Vec<String>) -> Box<dyn RegistryKey> {
        self.inner.open_handles.fetch_add(1, Ordering::AcqRel);
        Box::new(MemoryKey {
            registry: Arc::clone(&self.inner),
            handle: self.inner.next_handle.fetch_add(1, Ordering::Relaxed),
            hive,
            display,
            folded,
        })
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInner {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl MemoryState {
    fn notify(&mut self, hive: Hive, path: &[String], kind: NotifyFilter) {
        self.watches.retain(|watch| {
            if watch.is_orphaned() {
                trace!(hive = %watch.hive, "Dropping notification whose thread exited");
                return false;
            }

            if watch.covers(hive, path, kind) {
                watch.event.set();
                return false;
            }

            true
        });
    }

    fn node(&self, hive: Hive, folded: &[String]) -> Option<&Node> {
        self.hives.get(&hive).and_then(|root| root.find(folded))
    }

    fn readable(&self, hive: Hive, folded: &[String], display: &str) -> Result<&Node> {
        if self.denied.contains(&(hive, folded.join("\\"))) {
            return Err(RegistryError::access(display, "access is denied"));
        }

        self.node(hive, folded)
            .ok_or_else(|| RegistryError::access(display, "the key has been deleted"))
    }
}

impl RegistryBackend for MemoryRegistry {
    fn open_root(
        &self,
        hive: Hive,
        path: &str,
        _writable: bool,
    ) -> Result<Option<Box<dyn RegistryKey>>> {
        let folded = fold_path(path);
        {
            let state = self.inner.lock();

            if state.node(hive, &folded).is_none() {
                return Ok(None);
            }

            if state.denied.contains(&(hive, folded.join("\\"))) {
                return Err(RegistryError::access(path, "access is denied"));
            }
        }

        let display = split_key_path(path).join("\\");
        Ok(Some(self.open(hive, display, folded)))
    }

    fn supports_thread_agnostic_notify(&self) -> bool {
        self.inner.thread_agnostic
    }
}

/// Handle to one key of a [`MemoryRegistry`].
struct MemoryKey {
    registry: Arc<MemoryInner>,
    handle: u64,
    hive: Hive,
    display: String,
    folded: Vec<String>,
}

impl RegistryKey for MemoryKey {
    fn name(&self) -> &str {
        &self.display
    }

    fn value_names(&self) -> Result<Vec<String>> {
        let state = self.registry.lock();
        let node = state.readable(self.hive, &self.folded, &self.display)?;
        Ok(node.values.values().map(|(name, _)| name.clone()).collect())
    }

    fn value(&self, name: &str) -> Result<Option<String>> {
        let state = self.registry.lock();
        let node = state.readable(self.hive, &self.folded, &self.display)?;
        Ok(node
            .values
            .get(&fold(name))
            .and_then(|(_, value)| value.clone()))
    }

    fn subkey_names(&self) -> Result<Vec<String>> {
        let state = self.registry.lock();
        let node = state.readable(self.hive, &self.folded, &self.display)?;
        Ok(node.children.values().map(|child| child.name.clone()).collect())
    }

    fn open_subkey(&self, name: &str, _writable: bool) -> Result<Option<Box<dyn RegistryKey>>> {
        let state = self.registry.lock();
        let node = state.readable(self.hive, &self.folded, &self.display)?;
        let folded_name = fold(name);

        let Some(child) = node.children.get(&folded_name) else {
            return Ok(None);
        };

        let display = join_key_path(&self.display, &child.name);
        let mut folded = self.folded.clone();
        folded.push(folded_name);
        drop(state);

        let registry = MemoryRegistry {
            inner: Arc::clone(&self.registry),
        };
        Ok(Some(registry.open(self.hive, display, folded)))
    }

    fn notify_change_key_value(
        &self,
        watch_subtree: bool,
        filter: NotifyFilter,
        event: &ManualResetEvent,
    ) -> u32 {
        let mut state = self.registry.lock();
        state.notify_calls += 1;

        if let Some(status) = state.fail_next_notify.take() {
            return status;
        }

        if filter.is_thread_agnostic() && !self.registry.thread_agnostic {
            return STATUS_INVALID_PARAMETER;
        }

        if state.node(self.hive, &self.folded).is_none() {
            return STATUS_KEY_DELETED;
        }

        let owner = (!filter.is_thread_agnostic()).then(current_thread_lifetime);

        state.watches.push(Watch {
            handle: self.handle,
            hive: self.hive,
            path: self.folded.clone(),
            subtree: watch_subtree,
            filter: filter.change_kinds(),
            event: event.clone(),
            owner,
        });

        STATUS_SUCCESS
    }
}

impl Drop for MemoryKey {
    fn drop(&mut self) {
        let handle = self.handle;
        self.registry
            .lock()
            .watches
            .retain(|watch| watch.handle != handle);
        self.registry.open_handles.fetch_sub(1, Ordering::AcqRel);
    }
}
