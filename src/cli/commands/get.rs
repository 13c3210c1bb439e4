use crate::cli::{CliError, CommandResult, SourceArgs, formatting::format_value};

use super::open_provider;

pub(super) fn execute(source: &SourceArgs, path: &str) -> CommandResult {
    let provider = open_provider(source, |options| options.reload_on_change(false))?;

    match provider.try_get(path) {
        Some(value) => Ok(format!("{}: {}", path, format_value(value.as_deref()))),
        None => Err(CliError::PathNotFound(path.to_string())),
    }
}
