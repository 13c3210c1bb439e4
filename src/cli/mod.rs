//! Command-line front end.
//!
//! Reads a registry laid out on disk (see [`FsRegistry`](crate::registry::FsRegistry))
//! through the same provider an application would use, so a source
//! definition can be checked and its live reloads observed from a shell.

mod args;
mod commands;
pub mod formatting;
mod types;

#[cfg(test)]
mod tests;

pub use args::{Cli, Commands, SourceArgs};
pub use commands::run;
pub use types::{CliError, CommandResult};
