use std::time::Instant;

/// Raised after every background re-walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadEvent {
    /// Increments by one per reload, starting at 1
    pub sequence: u64,
    /// Paths added, removed or changed by the reload
    pub changed_paths: Vec<String>,
    /// `false` if the re-walk failed and the data was cleared
    pub succeeded: bool,
    /// When the new data was published
    pub timestamp: Instant,
}

impl ReloadEvent {
    /// Whether `path` is among the changed paths, ignoring case.
    pub fn touches(&self, path: &str) -> bool {
        self.changed_paths
            .iter()
            .any(|changed| super::path::segments_equal(changed, path))
    }
}
