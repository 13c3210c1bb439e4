use std::{fmt, str::FromStr};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::{RegistryError, Result};

/// Top-level namespace of the store.
///
/// All well-known hives can be named, but only [`Hive::LocalMachine`] and
/// [`Hive::CurrentUser`] can back a configuration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Hive {
    /// File associations and COM registrations.
    ClassesRoot,

    /// Settings of the current user.
    CurrentUser,

    /// Machine-wide settings (default).
    #[default]
    LocalMachine,

    /// All loaded user profiles.
    Users,

    /// Performance counters.
    PerformanceData,

    /// Current hardware profile.
    CurrentConfig,
}

impl Hive {
    /// Every hive, in declaration order.
    pub const ALL: [Hive; 6] = [
        Hive::ClassesRoot,
        Hive::CurrentUser,
        Hive::LocalMachine,
        Hive::Users,
        Hive::PerformanceData,
        Hive::CurrentConfig,
    ];

    /// Whether this hive can back a configuration source.
    pub fn is_supported(self) -> bool {
        matches!(self, Hive::LocalMachine | Hive::CurrentUser)
    }

    /// Returns the hive if supported.
    ///
    /// # Errors
    /// Returns `RegistryError::UnsupportedHive` for any other hive.
    pub fn ensure_supported(self) -> Result<Self> {
        if self.is_supported() {
            Ok(self)
        } else {
            Err(RegistryError::UnsupportedHive(self))
        }
    }

    /// Canonical `HKEY_*` name.
    pub fn long_name(self) -> &'static str {
        match self {
            Hive::ClassesRoot => "HKEY_CLASSES_ROOT",
            Hive::CurrentUser => "HKEY_CURRENT_USER",
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
            Hive::Users => "HKEY_USERS",
            Hive::PerformanceData => "HKEY_PERFORMANCE_DATA",
            Hive::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }

    /// Abbreviated `HK*` name.
    pub fn short_name(self) -> &'static str {
        match self {
            Hive::ClassesRoot => "HKCR",
            Hive::CurrentUser => "HKCU",
            Hive::LocalMachine => "HKLM",
            Hive::Users => "HKU",
            Hive::PerformanceData => "HKPD",
            Hive::CurrentConfig => "HKCC",
        }
    }

    fn snake_name(self) -> &'static str {
        match self {
            Hive::ClassesRoot => "classes_root",
            Hive::CurrentUser => "current_user",
            Hive::LocalMachine => "local_machine",
            Hive::Users => "users",
            Hive::PerformanceData => "performance_data",
            Hive::CurrentConfig => "current_config",
        }
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.long_name())
    }
}

impl FromStr for Hive {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        let compact: String = wanted
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect();

        Hive::ALL
            .into_iter()
            .find(|hive| {
                hive.long_name().eq_ignore_ascii_case(wanted)
                    || hive.short_name().eq_ignore_ascii_case(wanted)
                    || hive.snake_name().eq_ignore_ascii_case(wanted)
                    || hive.snake_name().replace('_', "").eq_ignore_ascii_case(&compact)
            })
            .ok_or_else(|| RegistryError::UnknownHive(wanted.to_string()))
    }
}
