use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    provider::{RegistryConfigOptions, RegistrySourceConfig},
    registry::Hive,
};

use super::CliError;

/// Inspect configuration stored in a registry directory tree.
#[derive(Parser, Debug)]
#[command(name = "registry-config")]
#[command(about = "Inspect and watch registry-backed configuration")]
#[command(version)]
pub struct Cli {
    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print every entry under the root key
    Dump {
        /// Where to read from
        #[command(flatten)]
        source: SourceArgs,

        /// Print a JSON object instead of lines
        #[arg(long)]
        json: bool,
    },

    /// Print a single value
    Get {
        /// Where to read from
        #[command(flatten)]
        source: SourceArgs,

        /// Colon-separated path, e.g. `DefaultConnection:Provider`
        path: String,
    },

    /// Print the entries that change on every reload until Ctrl+C
    Watch {
        /// Where to read from
        #[command(flatten)]
        source: SourceArgs,

        /// Only report reloads touching paths that match (supports `*`)
        #[arg(default_value = "*")]
        pattern: String,
    },

    /// Print the JSON schema of a source definition file
    Schema,
}

/// Locates the registry and the root key to read.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Directory that stands in for the hive
    #[arg(long)]
    pub hive_dir: PathBuf,

    /// Hive name (HKCU, HKEY_LOCAL_MACHINE, current_user, ...)
    #[arg(long, default_value = "local_machine")]
    pub hive: Hive,

    /// Root key below the hive
    #[arg(long, conflicts_with = "source")]
    pub root_key: Option<String>,

    /// TOML source definition to read the settings from
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Fail if the root key is missing
    #[arg(long)]
    pub required: bool,

    /// Reload delay in milliseconds (watch only)
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

impl SourceArgs {
    /// Builds provider options from a definition file or the flags.
    ///
    /// # Errors
    /// Returns `CliError::InvalidArguments` if neither `--root-key` nor
    /// `--source` is given, or `CliError::Registry` if the definition file
    /// cannot be read.
    pub fn to_options(&self) -> Result<RegistryConfigOptions, CliError> {
        let mut options = match (&self.source, &self.root_key) {
            (Some(path), _) => RegistrySourceConfig::load(path)?.into_options(),
            (None, Some(root_key)) => RegistryConfigOptions::new(root_key.clone(), self.hive),
            (None, None) => {
                return Err(CliError::InvalidArguments(
                    "Expected --root-key or --source".to_string(),
                ));
            }
        };

        if self.required {
            options.optional = false;
        }
        if let Some(delay_ms) = self.delay_ms {
            options.reload_delay = std::time::Duration::from_millis(delay_ms);
        }

        Ok(options)
    }
}
