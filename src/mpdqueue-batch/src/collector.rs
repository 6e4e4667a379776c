use mpdqueue_core::ImportUnit;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// Paths waiting to be queued, in the order they were imported.
///
/// Appending never reorders. The batch is handed to the orchestrator by value
/// and consumed by a single flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingBatch {
    paths: Vec<String>,
    library_root: Option<PathBuf>,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute paths under `root` are queued relative to it, as the server
    /// addresses files relative to its music directory.
    pub fn with_library_root(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: Vec::new(),
            library_root: Some(root.into()),
        }
    }

    /// Add the files of one import event and return how many were appended.
    ///
    /// Re-scans of known library content (no top-level import path) add
    /// nothing. Files are appended by ascending track number; ties keep their
    /// delivery order.
    pub fn collect(&mut self, unit: ImportUnit) -> usize {
        if !unit.is_fresh_import() {
            tracing::debug!(files = unit.files.len(), "skipping library re-scan");
            return 0;
        }

        let mut files = unit.files;
        files.sort_by_key(|file| file.track_number);
        let count = files.len();
        for file in files {
            let uri = self.library_uri(&file.path);
            tracing::debug!(path = %uri, "will be added to queue");
            self.paths.push(uri);
        }
        count
    }

    /// Append one already server-relative path.
    pub fn push(&mut self, path: impl Into<String>) {
        self.paths.push(path.into());
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn into_paths(self) -> Vec<String> {
        self.paths
    }

    /// Unique parent directories of every queued path.
    pub fn directories(&self) -> BTreeSet<String> {
        self.paths
            .iter()
            .map(|path| parent_directory(path).to_string())
            .collect()
    }

    fn library_uri(&self, path: &str) -> String {
        let Some(root) = self.library_root.as_deref() else {
            return path.to_string();
        };
        let Ok(relative) = Path::new(path).strip_prefix(root) else {
            return path.to_string();
        };

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy()),
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        tracing::warn!(path, "path leaves the music directory, queueing it unchanged");
                        return path.to_string();
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        parts.join("/")
    }
}

/// Text before the last `/`, or the empty string (the library root) for top-level files.
pub fn parent_directory(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}
