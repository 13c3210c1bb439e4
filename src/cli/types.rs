use thiserror::Error;

use crate::core::RegistryError;

/// Errors that can occur during CLI command execution.
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid arguments were provided to a command.
    ///
    /// Returned when the arguments parse but do not describe a usable
    /// source, such as neither a root key nor a definition file.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The requested path is not present in the loaded data.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Loading or watching the registry failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Output could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Installing the Ctrl+C handler or another I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a CLI command: the text to print on success.
pub type CommandResult = Result<String, CliError>;
