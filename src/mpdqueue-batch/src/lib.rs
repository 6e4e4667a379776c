mod collector;
mod orchestrator;
mod report;

pub use collector::{parent_directory, PendingBatch};
pub use orchestrator::{FlushError, QueueOrchestrator};
pub use report::{DirectoryOutcome, DirectoryStatus, FileOutcome, FileStatus, FlushReport};
