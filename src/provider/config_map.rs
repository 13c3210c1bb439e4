use std::{
    cmp::Ordering,
    collections::{BTreeMap, btree_map},
};

use super::path::{KEY_DELIMITER, path_matches, segments_equal};

/// Map key ordered and compared case-insensitively, keeping the spelling
/// it was first inserted with.
#[derive(Debug, Clone)]
struct PathKey(String);

impl PathKey {
    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars().flat_map(char::to_lowercase)
    }
}

impl PartialEq for PathKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PathKey {}

impl PartialOrd for PathKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

/// Flattened configuration data: path to value, where a value may be
/// present but null.
///
/// Paths are compared case-insensitively and iterate in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMap {
    entries: BTreeMap<PathKey, Option<String>>,
}

impl ConfigMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value at `path`, returning the previous one.
    ///
    /// An existing entry keeps its original spelling.
    pub fn insert(&mut self, path: impl Into<String>, value: Option<String>) -> Option<Option<String>> {
        self.entries.insert(PathKey(path.into()), value)
    }

    /// Value at `path`, or `None` if absent or null.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.get_entry(path).flatten()
    }

    /// Distinguishes a missing entry (`None`) from a null one (`Some(None)`).
    pub fn get_entry(&self, path: &str) -> Option<Option<&str>> {
        self.entries
            .get(&PathKey(path.to_string()))
            .map(Option::as_deref)
    }

    /// Whether `path` is present, null or not.
    pub fn contains_key(&self, path: &str) -> bool {
        self.entries.contains_key(&PathKey(path.to_string()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in case-insensitive path order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    /// Paths in case-insensitive order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|key| key.0.as_str())
    }

    /// Entries whose path matches `pattern` (see [`path_matches`]).
    pub fn matching<'a>(&'a self, pattern: &'a str) -> impl Iterator<Item = (&'a str, Option<&'a str>)> {
        self.iter().filter(move |(path, _)| path_matches(path, pattern))
    }

    /// Entries under `prefix`, re-rooted so `prefix` itself becomes `""`.
    pub fn section(&self, prefix: &str) -> ConfigMap {
        if prefix.is_empty() {
            return self.clone();
        }

        let nested = format!("{prefix}{KEY_DELIMITER}");
        let mut section = ConfigMap::new();

        for (path, value) in self.iter() {
            let relative = if path.len() == prefix.len() {
                strip_prefix_ignore_case(path, prefix)
            } else {
                strip_prefix_ignore_case(path, &nested)
            };

            if let Some(relative) = relative {
                section.insert(relative, value.map(str::to_string));
            }
        }

        section
    }

    /// Distinct names of the segments directly below `prefix`.
    pub fn child_keys(&self, prefix: &str) -> Vec<String> {
        let mut children: Vec<String> = Vec::new();

        for path in self.section(prefix).keys() {
            let Some(first) = path.split(KEY_DELIMITER).next().filter(|s| !s.is_empty()) else {
                continue;
            };
            if !children
                .iter()
                .any(|seen| segments_equal(seen, first))
            {
                children.push(first.to_string());
            }
        }

        children
    }

    /// Paths whose presence or value differs between `self` and `newer`.
    ///
    /// Paths that only changed case are not reported.
    pub fn changed_paths(&self, newer: &ConfigMap) -> Vec<String> {
        let mut changes = Vec::new();

        for (key, old_value) in &self.entries {
            match newer.entries.get(key) {
                Some(new_value) if new_value == old_value => {}
                _ => changes.push(key.0.clone()),
            }
        }

        for key in newer.entries.keys() {
            if !self.entries.contains_key(key) {
                changes.push(key.0.clone());
            }
        }

        changes.sort_by(|a, b| PathKey(a.clone()).cmp(&PathKey(b.clone())));
        changes
    }
}

fn strip_prefix_ignore_case<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let head = path.get(..prefix.len())?;
    if segments_equal(head, prefix) {
        path.get(prefix.len()..)
    } else {
        None
    }
}

/// Iterator over [`ConfigMap`] entries.
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, PathKey, Option<String>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, Option<&'a str>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(key, value)| (key.0.as_str(), value.as_deref()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a ConfigMap {
    type Item = (&'a str, Option<&'a str>);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for ConfigMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut map = ConfigMap::new();
        for (path, value) in iter {
            map.insert(path, value.map(Into::into));
        }
        map
    }
}
