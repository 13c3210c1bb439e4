use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher,
};
use tracing::{debug, warn};

use crate::{
    core::{RegistryError, Result},
    signal::ManualResetEvent,
};

use super::{
    Hive, NotifyFilter, RegistryBackend, RegistryKey, STATUS_SUCCESS, join_key_path,
    split_key_path,
};

/// File name that holds a key's unnamed (default) value.
pub const DEFAULT_VALUE_FILE: &str = "(default)";

/// Status returned when the watched directory has disappeared.
pub const STATUS_PATH_NOT_FOUND: u32 = 3;

/// Status returned for any other watcher failure.
pub const STATUS_WATCH_FAILED: u32 = 31;

/// A registry laid out on disk.
///
/// Each mounted hive is a directory. Keys are subdirectories and values
/// are regular files holding the value text; the unnamed value lives in a
/// file called [`DEFAULT_VALUE_FILE`]. Change notifications come from the
/// platform file watcher and are always thread-agnostic.
#[derive(Debug, Clone, Default)]
pub struct FsRegistry {
    roots: HashMap<Hive, PathBuf>,
}

impl FsRegistry {
    /// Creates a registry with no hives mounted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `hive` at directory `root`.
    pub fn with_hive(mut self, hive: Hive, root: impl Into<PathBuf>) -> Self {
        self.roots.insert(hive, root.into());
        self
    }

    /// Directory backing `hive`, if mounted.
    pub fn hive_root(&self, hive: Hive) -> Option<&Path> {
        self.roots.get(&hive).map(PathBuf::as_path)
    }
}

impl RegistryBackend for FsRegistry {
    fn open_root(
        &self,
        hive: Hive,
        path: &str,
        _writable: bool,
    ) -> Result<Option<Box<dyn RegistryKey>>> {
        let Some(root) = self.roots.get(&hive) else {
            return Ok(None);
        };

        let segments = split_key_path(path);
        let dir = segments
            .iter()
            .fold(root.clone(), |dir, segment| dir.join(segment));

        match fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(Some(Box::new(FsKey::new(dir, segments.join("\\"))))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegistryError::access(path, e)),
        }
    }

    fn supports_thread_agnostic_notify(&self) -> bool {
        true
    }
}

/// Handle to one directory-backed key.
struct FsKey {
    dir: PathBuf,
    name: String,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FsKey {
    fn new(dir: PathBuf, name: String) -> Self {
        Self {
            dir,
            name,
            watcher: Mutex::new(None),
        }
    }

    fn entries(&self, want_dirs: bool) -> Result<Vec<String>> {
        let read_dir = fs::read_dir(&self.dir).map_err(|e| RegistryError::access(&self.name, e))?;
        let mut names = Vec::new();

        for entry in read_dir {
            let entry = entry.map_err(|e| RegistryError::access(&self.name, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| RegistryError::access(&self.name, e))?;

            if file_type.is_dir() != want_dirs {
                continue;
            }

            let Ok(name) = entry.file_name().into_string() else {
                warn!(key = %self.name, "Skipping entry with a non UTF-8 name");
                continue;
            };

            names.push(name);
        }

        names.sort();
        Ok(names)
    }

    fn value_file(&self, name: &str) -> PathBuf {
        if name.trim().is_empty() {
            self.dir.join(DEFAULT_VALUE_FILE)
        } else {
            self.dir.join(name)
        }
    }
}

impl RegistryKey for FsKey {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_names(&self) -> Result<Vec<String>> {
        Ok(self
            .entries(false)?
            .into_iter()
            .map(|name| {
                if name == DEFAULT_VALUE_FILE {
                    String::new()
                } else {
                    name
                }
            })
            .collect())
    }

    fn value(&self, name: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.value_file(name)) {
            Ok(content) => Ok(Some(trim_line_ending(content))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegistryError::access(join_key_path(&self.name, name), e)),
        }
    }

    fn subkey_names(&self) -> Result<Vec<String>> {
        self.entries(true)
    }

    fn open_subkey(&self, name: &str, _writable: bool) -> Result<Option<Box<dyn RegistryKey>>> {
        let dir = self.dir.join(name);
        let child_name = join_key_path(&self.name, name);

        match fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(Some(Box::new(FsKey::new(dir, child_name)))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegistryError::access(child_name, e)),
        }
    }

    fn notify_change_key_value(
        &self,
        watch_subtree: bool,
        filter: NotifyFilter,
        event: &ManualResetEvent,
    ) -> u32 {
        let kinds = filter.change_kinds();
        let event = event.clone();
        let fired = Arc::new(AtomicBool::new(false));

        let watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(change) = res else {
                return;
            };

            if fired.load(Ordering::Acquire) || !kinds.intersects(classify(&change)) {
                return;
            }

            fired.store(true, Ordering::Release);
            event.set();
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!(key = %self.name, error = %e, "Failed to create file watcher");
                return STATUS_WATCH_FAILED;
            }
        };

        let mode = if watch_subtree {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        if let Err(e) = watcher.watch(&self.dir, mode) {
            warn!(key = %self.name, error = %e, "Failed to watch key directory");
            return match e.kind {
                notify::ErrorKind::PathNotFound => STATUS_PATH_NOT_FOUND,
                notify::ErrorKind::Io(ref source) if source.kind() == io::ErrorKind::NotFound => {
                    STATUS_PATH_NOT_FOUND
                }
                _ => STATUS_WATCH_FAILED,
            };
        }

        debug!(key = %self.name, subtree = watch_subtree, "Armed directory watch");

        match self.watcher.lock() {
            Ok(mut slot) => *slot = Some(watcher),
            Err(poisoned) => *poisoned.into_inner() = Some(watcher),
        }

        STATUS_SUCCESS
    }
}

/// Maps a file-system event onto the registry change kinds it represents.
fn classify(change: &Event) -> NotifyFilter {
    let touches_dir = change.paths.iter().any(|path| path.is_dir());

    match change.kind {
        EventKind::Create(_) if touches_dir => NotifyFilter::SUBKEY,
        EventKind::Create(_) => NotifyFilter::VALUE,
        // removed paths can no longer be inspected
        EventKind::Remove(_) => NotifyFilter::SUBKEY | NotifyFilter::VALUE,
        EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => NotifyFilter::ATTRIBUTES,
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => {
            NotifyFilter::SUBKEY | NotifyFilter::VALUE
        }
        EventKind::Modify(_) => NotifyFilter::VALUE,
        _ => NotifyFilter::empty(),
    }
}

fn trim_line_ending(mut content: String) -> String {
    if content.ends_with('\n') {
        content.pop();
        if content.ends_with('\r') {
            content.pop();
        }
    }
    content
}
