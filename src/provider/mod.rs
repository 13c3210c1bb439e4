//! Registry-backed configuration provider.
//!
//! [`TreeWalker`] flattens a subtree into a [`ConfigMap`];
//! [`RegistryConfigProvider`] loads it, optionally keeps it fresh by
//! watching for changes, and raises a [`ReloadEvent`] after every re-read.

mod config_map;
mod events;
mod options;
mod path;
mod registry_provider;
mod walker;


pub use config_map::{ConfigMap, Iter};
pub use events::ReloadEvent;
pub use options::{
    DEFAULT_RELOAD_DELAY, LoadExceptionContext, LoadExceptionHandler, LoadStep,
    RegistryConfigOptions, RegistrySourceConfig,
};
pub use path::{KEY_DELIMITER, combine, parent_path, path_matches};
pub use registry_provider::RegistryConfigProvider;
pub use walker::TreeWalker;
