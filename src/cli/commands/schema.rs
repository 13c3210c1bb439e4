use crate::{
    cli::{CliError, CommandResult},
    provider::RegistrySourceConfig,
};

pub(super) fn execute() -> CommandResult {
    serde_json::to_string_pretty(&RegistrySourceConfig::json_schema())
        .map_err(|e| CliError::Serialization(e.to_string()))
}
