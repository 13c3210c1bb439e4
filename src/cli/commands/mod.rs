mod dump;
mod get;
mod schema;
mod watch;

use std::sync::Arc;

use crate::{
    provider::{RegistryConfigOptions, RegistryConfigProvider},
    registry::FsRegistry,
};

use super::{Cli, CliError, CommandResult, Commands, SourceArgs};

/// Runs a parsed command and returns its output.
///
/// # Errors
/// Returns the command's `CliError`.
pub async fn run(cli: Cli) -> CommandResult {
    match cli.command {
        Commands::Dump { source, json } => dump::execute(&source, json),
        Commands::Get { source, path } => get::execute(&source, &path),
        Commands::Watch { source, pattern } => watch::execute(&source, &pattern).await,
        Commands::Schema => schema::execute(),
    }
}

/// Builds and loads a provider over the directory named by `source`.
fn open_provider(
    source: &SourceArgs,
    configure: impl FnOnce(RegistryConfigOptions) -> RegistryConfigOptions,
) -> Result<RegistryConfigProvider, CliError> {
    let options = configure(source.to_options()?);
    let backend = FsRegistry::new().with_hive(options.hive, &source.hive_dir);

    let provider = RegistryConfigProvider::new(options, Arc::new(backend))?;
    provider.load()?;
    Ok(provider)
}
