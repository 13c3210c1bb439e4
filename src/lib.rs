//! Live configuration from a hierarchical registry-style key/value store.
//!
//! A subtree of the store is flattened into a case-insensitive map of
//! colon-separated paths to string values. With reload-on-change enabled,
//! a background task waits for the store's change notification, lets the
//! burst of writes settle, re-reads the subtree and swaps the new data in
//! atomically.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use registry_config::{
//!     provider::{RegistryConfigOptions, RegistryConfigProvider},
//!     registry::{Hive, MemoryRegistry},
//! };
//!
//! # async fn run() -> registry_config::Result<()> {
//! let registry = MemoryRegistry::new();
//! registry.set_value(Hive::CurrentUser, r"SOFTWARE\Contoso\App", "Theme", "dark");
//!
//! let options = RegistryConfigOptions::new(r"SOFTWARE\Contoso\App", Hive::CurrentUser)
//!     .reload_on_change(true);
//! let provider = RegistryConfigProvider::new(options, Arc::new(registry))?;
//! provider.load()?;
//!
//! assert_eq!(provider.get("theme").as_deref(), Some("dark"));
//! # Ok(())
//! # }
//! ```

/// Core error types and result aliases.
pub mod core;

/// Store capability consumed by the provider, plus bundled backends.
pub mod registry;

/// Event object and cancellable asynchronous waiting.
pub mod signal;

/// One-shot change notifications and the dedicated arming thread.
pub mod watch;

/// Tree flattening, options and the reloading provider.
pub mod provider;

/// Command-line interface over a directory-backed registry.
pub mod cli;

/// Logging setup.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use core::{RegistryError, Result};
