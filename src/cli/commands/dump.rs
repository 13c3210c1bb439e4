use serde_json::{Map, Value};

use crate::cli::{CliError, CommandResult, SourceArgs, formatting::format_entry};

use super::open_provider;

pub(super) fn execute(source: &SourceArgs, json: bool) -> CommandResult {
    let provider = open_provider(source, |options| options.reload_on_change(false))?;
    let data = provider.snapshot();

    if json {
        let object: Map<String, Value> = data
            .iter()
            .map(|(path, value)| {
                let value = value.map_or(Value::Null, |text| Value::String(text.to_string()));
                (path.to_string(), value)
            })
            .collect();

        return serde_json::to_string_pretty(&object)
            .map_err(|e| CliError::Serialization(e.to_string()));
    }

    Ok(data
        .iter()
        .map(|(path, value)| format_entry(path, value))
        .collect::<Vec<_>>()
        .join("\n"))
}
