use thiserror::Error;

use crate::registry::Hive;

/// Error types for registry-backed configuration.
///
/// Covers invalid options, store access failures, change-notification
/// failures and the background reload loop. Cancellation has its own
/// variant so callers can tell it apart from real failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An option or argument was missing or blank.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// Name of the offending argument
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The hive is a valid registry namespace but not one this crate reads.
    #[error("unsupported registry hive '{0}'")]
    UnsupportedHive(Hive),

    /// A hive name could not be parsed at all.
    #[error("unknown registry hive '{0}'")]
    UnknownHive(String),

    /// A required (non-optional) root key does not exist.
    #[error("registry key '{path}' was not found")]
    KeyNotFound {
        /// Root key path relative to the hive
        path: String,
    },

    /// The root key could not be opened for change monitoring.
    #[error("failed to open the registry key '{path}' for watching")]
    WatchRootUnavailable {
        /// Root key path relative to the hive
        path: String,
    },

    /// Reading from the store failed (permissions, corruption, I/O).
    #[error("registry access failed for '{path}': {details}")]
    Access {
        /// Key or value path where the failure occurred
        path: String,
        /// Underlying error details
        details: String,
    },

    /// The change-notification call reported a non-zero status.
    #[error("change notification request failed with status {code}")]
    Platform {
        /// Status code returned by the store
        code: u32,
    },

    /// A background re-walk failed.
    #[error("failed to load configuration from registry key '{path}': {source}")]
    Reload {
        /// Root key path relative to the hive
        path: String,
        /// The failure that aborted the re-walk
        #[source]
        source: Box<RegistryError>,
    },

    /// The dedicated watcher thread could not run the requested work.
    #[error("dedicated watcher thread failed: {details}")]
    DedicatedThread {
        /// What went wrong
        details: String,
    },

    /// The blocking task that re-reads the subtree did not complete.
    #[error("registry walk task failed: {details}")]
    WalkTask {
        /// Why the task ended without a result
        details: String,
    },

    /// A source definition could not be read or parsed.
    #[error("failed to load source definition from {location}: {details}")]
    SourceDefinition {
        /// File path or other description of where the definition came from
        location: String,
        /// Parser or I/O error details
        details: String,
    },

    /// Reload-on-change was requested outside of a Tokio runtime.
    #[error("reload on change requires a running Tokio runtime")]
    RuntimeUnavailable,

    /// The wait or delay was cancelled.
    #[error("operation was cancelled")]
    Cancelled,
}

/// A specialized `Result` type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    /// Creates an access error from any displayable failure.
    pub fn access(path: impl Into<String>, error: impl std::fmt::Display) -> Self {
        RegistryError::Access {
            path: path.into(),
            details: error.to_string(),
        }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        RegistryError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// Whether this error only signals cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RegistryError::Cancelled)
    }
}
