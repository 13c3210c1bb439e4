use tracing::{debug, instrument};

use crate::{
    core::{RegistryError, Result},
    registry::{Hive, RegistryBackend, RegistryKey},
};

use super::{
    config_map::ConfigMap,
    path::{KEY_DELIMITER, parent_path},
};

/// Flattens a registry subtree into a [`ConfigMap`].
///
/// Values are visited before subkeys at every level. Each entry is keyed
/// by the names from the root down, joined with [`KEY_DELIMITER`]; the root
/// itself contributes no segment. A key's unnamed value is stored at the
/// key's own path.
pub struct TreeWalker<'a> {
    backend: &'a dyn RegistryBackend,
    hive: Hive,
    root_key: &'a str,
    optional: bool,
}

impl<'a> TreeWalker<'a> {
    /// Creates a walker over `root_key` in `hive`.
    pub fn new(backend: &'a dyn RegistryBackend, hive: Hive, root_key: &'a str, optional: bool) -> Self {
        Self {
            backend,
            hive,
            root_key,
            optional,
        }
    }

    /// Opens the root read-only and walks it.
    ///
    /// A missing root yields an empty map when the walker is optional.
    ///
    /// # Errors
    /// Returns `RegistryError::KeyNotFound` for a missing required root, or
    /// any store error raised while reading.
    #[instrument(skip(self), fields(hive = %self.hive, root_key = %self.root_key))]
    pub fn walk(&self) -> Result<ConfigMap> {
        match self.backend.open_root(self.hive, self.root_key, false)? {
            Some(root) => {
                let data = Self::walk_key(root.as_ref())?;
                debug!(entries = data.len(), "Walked registry tree");
                Ok(data)
            }
            None if self.optional => {
                debug!("Optional root key is missing");
                Ok(ConfigMap::new())
            }
            None => Err(RegistryError::KeyNotFound {
                path: self.root_key.to_string(),
            }),
        }
    }

    /// Walks an already opened key.
    ///
    /// # Errors
    /// Returns any store error raised while reading.
    pub fn walk_key(root: &dyn RegistryKey) -> Result<ConfigMap> {
        let mut walk = Walk::default();
        walk.visit_key(root)?;
        Ok(walk.data)
    }
}

/// Traversal position, one segment per level below the root.
#[derive(Default)]
struct PathContext {
    segments: Vec<String>,
}

impl PathContext {
    fn enter(&mut self, segment: &str) {
        self.segments.push(segment.to_string());
    }

    fn exit(&mut self) {
        self.segments.pop();
    }

    fn current(&self) -> String {
        self.segments.join(KEY_DELIMITER)
    }
}

#[derive(Default)]
struct Walk {
    data: ConfigMap,
    context: PathContext,
}

impl Walk {
    fn visit_key(&mut self, key: &dyn RegistryKey) -> Result<()> {
        for name in key.value_names()? {
            self.context.enter(&name);
            self.visit_value(key, &name)?;
            self.context.exit();
        }

        for name in key.subkey_names()? {
            // removed between enumeration and open
            let Some(child) = key.open_subkey(&name, false)? else {
                continue;
            };

            self.context.enter(&name);
            self.visit_key(child.as_ref())?;
            self.context.exit();
        }

        Ok(())
    }

    fn visit_value(&mut self, key: &dyn RegistryKey, name: &str) -> Result<()> {
        let value = key.value(name)?;
        let mut path = self.context.current();

        if name.trim().is_empty() {
            path = parent_path(&path).to_string();
        }

        self.data.insert(path, value);
        Ok(())
    }
}
