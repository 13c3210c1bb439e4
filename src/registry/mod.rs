//! Hierarchical key/value store capability.
//!
//! The provider never talks to a concrete store directly. It consumes the
//! narrow [`RegistryBackend`] / [`RegistryKey`] interface below, which mirrors
//! what a registry SDK offers: open a root, enumerate values and subkeys,
//! read a value, and arm a one-shot change notification.
//!
//! Two backends ship with the crate:
//! - [`MemoryRegistry`] keeps the tree in process and can emulate platforms
//!   whose notifications are tied to the arming thread.
//! - [`FsRegistry`] maps keys to directories and values to files.

mod filter;
mod fs;
mod hive;
mod memory;

#[cfg(test)]
mod tests;

pub use filter::NotifyFilter;
pub use fs::{DEFAULT_VALUE_FILE, FsRegistry, STATUS_PATH_NOT_FOUND, STATUS_WATCH_FAILED};
pub use hive::Hive;
pub use memory::{MemoryRegistry, STATUS_INVALID_PARAMETER, STATUS_KEY_DELETED};

use crate::{core::Result, signal::ManualResetEvent};

/// Status code reported by a successful notification request.
pub const STATUS_SUCCESS: u32 = 0;

/// Entry point into a key/value store.
pub trait RegistryBackend: Send + Sync {
    /// Opens `path` under `hive`.
    ///
    /// Returns `Ok(None)` when the key does not exist.
    ///
    /// # Errors
    /// Returns `RegistryError::Access` if the key exists but cannot be opened.
    fn open_root(&self, hive: Hive, path: &str, writable: bool)
    -> Result<Option<Box<dyn RegistryKey>>>;

    /// Whether notifications can be requested from any thread and outlive it.
    ///
    /// Backends that answer `false` require the arming call to be issued
    /// from a thread that stays alive until the notification fires.
    fn supports_thread_agnostic_notify(&self) -> bool;
}

/// An open handle to one key of the store.
///
/// Dropping the handle releases it.
pub trait RegistryKey: Send + Sync {
    /// Full path of this key relative to its hive.
    fn name(&self) -> &str;

    /// Names of the values stored directly on this key.
    ///
    /// The empty string denotes the key's unnamed (default) value.
    ///
    /// # Errors
    /// Returns `RegistryError::Access` if the key can no longer be read.
    fn value_names(&self) -> Result<Vec<String>>;

    /// Reads a value as a string. `Ok(None)` if it is unset.
    ///
    /// # Errors
    /// Returns `RegistryError::Access` if the key can no longer be read.
    fn value(&self, name: &str) -> Result<Option<String>>;

    /// Names of the direct child keys.
    ///
    /// # Errors
    /// Returns `RegistryError::Access` if the key can no longer be read.
    fn subkey_names(&self) -> Result<Vec<String>>;

    /// Opens a direct child key. `Ok(None)` if it does not exist.
    ///
    /// # Errors
    /// Returns `RegistryError::Access` if the child exists but cannot be opened.
    fn open_subkey(&self, name: &str, writable: bool) -> Result<Option<Box<dyn RegistryKey>>>;

    /// Arms a one-shot change notification that sets `event` when a change
    /// matching `filter` happens on this key (or below it, with `watch_subtree`).
    ///
    /// Returns [`STATUS_SUCCESS`] or a store-specific error code.
    fn notify_change_key_value(
        &self,
        watch_subtree: bool,
        filter: NotifyFilter,
        event: &ManualResetEvent,
    ) -> u32;
}

/// Joins a parent key path and a child name with the store's `\` separator.
pub(crate) fn join_key_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}\\{child}")
    }
}

/// Splits a key path on `\` or `/`, dropping empty segments.
pub(crate) fn split_key_path(path: &str) -> Vec<&str> {
    path.split(['\\', '/'])
        .filter(|segment| !segment.is_empty())
        .collect()
}
