use std::{fmt, fs, path::Path, sync::Arc, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    core::{RegistryError, Result},
    registry::Hive,
};

/// Grace interval between a change notification and the re-walk.
pub const DEFAULT_RELOAD_DELAY: Duration = Duration::from_millis(DEFAULT_RELOAD_DELAY_MS);

const DEFAULT_RELOAD_DELAY_MS: u64 = 250;

/// Hook invoked when loading fails. It may set
/// [`LoadExceptionContext::ignore`] to suppress the error.
pub type LoadExceptionHandler = Arc<dyn Fn(&mut LoadExceptionContext<'_>) + Send + Sync>;

/// Which part of the lifecycle a load failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStep {
    /// The synchronous walk performed by `load()`.
    InitialLoad,
    /// Opening the root key for the background watch.
    OpenWatchRoot,
    /// Arming, waiting or re-walking in the background loop.
    Reload,
}

/// Passed to the load exception hook.
#[derive(Debug)]
pub struct LoadExceptionContext<'a> {
    /// Where the failure happened
    pub step: LoadStep,
    /// Hive being read
    pub hive: Hive,
    /// Root key being read
    pub root_key: &'a str,
    /// The failure
    pub error: &'a RegistryError,
    /// Set to `true` to suppress the failure. Starts equal to the
    /// source's `optional` flag.
    pub ignore: bool,
}

/// Settings for one registry-backed configuration source.
#[derive(Clone)]
pub struct RegistryConfigOptions {
    /// Root key path relative to the hive
    pub root_key: String,
    /// Hive the root key lives in
    pub hive: Hive,
    /// Tolerate a missing root key
    pub optional: bool,
    /// Watch the subtree and reload on change
    pub reload_on_change: bool,
    /// Pause after a change before re-reading
    pub reload_delay: Duration,
    /// Load failure hook
    pub on_load_exception: Option<LoadExceptionHandler>,
}

impl RegistryConfigOptions {
    /// Options for `root_key` in `hive` with the defaults: optional, no
    /// reload on change, 250 ms reload delay, no hook.
    pub fn new(root_key: impl Into<String>, hive: Hive) -> Self {
        Self {
            root_key: root_key.into(),
            hive,
            optional: true,
            reload_on_change: false,
            reload_delay: DEFAULT_RELOAD_DELAY,
            on_load_exception: None,
        }
    }

    /// Sets whether a missing root key is tolerated.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Sets whether changes trigger a reload.
    pub fn reload_on_change(mut self, reload_on_change: bool) -> Self {
        self.reload_on_change = reload_on_change;
        self
    }

    /// Sets the pause between a change and the re-walk.
    pub fn reload_delay(mut self, reload_delay: Duration) -> Self {
        self.reload_delay = reload_delay;
        self
    }

    /// Installs the load failure hook.
    pub fn on_load_exception<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut LoadExceptionContext<'_>) + Send + Sync + 'static,
    {
        self.on_load_exception = Some(Arc::new(handler));
        self
    }

    /// Checks the options before any store access.
    ///
    /// # Errors
    /// Returns `RegistryError::InvalidArgument` for a blank root key, or
    /// `RegistryError::UnsupportedHive` for a hive other than
    /// `LocalMachine` or `CurrentUser`.
    pub fn validate(&self) -> Result<()> {
        if self.root_key.trim().is_empty() {
            return Err(RegistryError::invalid_argument(
                "root_key",
                "must not be empty or whitespace",
            ));
        }

        self.hive.ensure_supported()?;
        Ok(())
    }
}

impl fmt::Debug for RegistryConfigOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfigOptions")
            .field("root_key", &self.root_key)
            .field("hive", &self.hive)
            .field("optional", &self.optional)
            .field("reload_on_change", &self.reload_on_change)
            .field("reload_delay", &self.reload_delay)
            .field("on_load_exception", &self.on_load_exception.is_some())
            .finish()
    }
}

/// Serialisable form of [`RegistryConfigOptions`], as read from TOML.
///
/// ```toml
/// root_key = 'SOFTWARE\Contoso\App'
/// hive = "current_user"
/// reload_on_change = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RegistrySourceConfig {
    /// Root key path relative to the hive.
    pub root_key: String,

    /// Hive the root key lives in.
    #[serde(default)]
    pub hive: Hive,

    /// Tolerate a missing root key.
    #[serde(default = "default_optional")]
    pub optional: bool,

    /// Watch the subtree and reload on change.
    #[serde(default)]
    pub reload_on_change: bool,

    /// Pause after a change before re-reading, in milliseconds.
    #[serde(default = "default_reload_delay_ms")]
    pub reload_delay_ms: u64,
}

fn default_optional() -> bool {
    true
}

fn default_reload_delay_ms() -> u64 {
    DEFAULT_RELOAD_DELAY_MS
}

impl RegistrySourceConfig {
    /// Parses a source definition from TOML text.
    ///
    /// # Errors
    /// Returns `RegistryError::SourceDefinition` if the text is not a valid
    /// definition.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RegistryError::SourceDefinition {
            location: "<inline>".to_string(),
            details: e.to_string(),
        })
    }

    /// Reads a source definition from a TOML file.
    ///
    /// # Errors
    /// Returns `RegistryError::SourceDefinition` if the file cannot be read
    /// or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let location = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| RegistryError::SourceDefinition {
            location: location.clone(),
            details: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| RegistryError::SourceDefinition {
            location,
            details: e.to_string(),
        })
    }

    /// JSON schema describing the TOML form.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(RegistrySourceConfig)
    }

    /// Converts into options with no exception hook.
    pub fn into_options(self) -> RegistryConfigOptions {
        RegistryConfigOptions {
            root_key: self.root_key,
            hive: self.hive,
            optional: self.optional,
            reload_on_change: self.reload_on_change,
            reload_delay: Duration::from_millis(self.reload_delay_ms),
            on_load_exception: None,
        }
    }
}

impl From<RegistrySourceConfig> for RegistryConfigOptions {
    fn from(config: RegistrySourceConfig) -> Self {
        config.into_options()
    }
}
