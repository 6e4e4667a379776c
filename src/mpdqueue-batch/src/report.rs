use serde::Serialize;

/// Per-directory and per-file outcome of one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub directories: Vec<DirectoryOutcome>,
    pub files: Vec<FileOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryOutcome {
    pub directory: String,
    #[serde(flatten)]
    pub status: DirectoryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DirectoryStatus {
    Synced { polls: u32 },
    /// The server refused the update; its files were still offered to the queue.
    Rejected { response: Vec<String> },
    TimedOut { polls: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub path: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Rejected { response: String },
}

impl FlushReport {
    pub fn added(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|file| file.status == FileStatus::Added)
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|file| file.status != FileStatus::Added)
    }

    /// True when every directory synced and every file was queued.
    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
            && self
                .directories
                .iter()
                .all(|dir| matches!(dir.status, DirectoryStatus::Synced { .. }))
    }
}

impl FileOutcome {
    pub fn added(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Added,
        }
    }

    pub fn rejected(path: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Rejected {
                response: response.into(),
            },
        }
    }
}

impl DirectoryOutcome {
    pub fn new(directory: impl Into<String>, status: DirectoryStatus) -> Self {
        Self {
            directory: directory.into(),
            status,
        }
    }
}
