//! Turns a pending batch into `update` and `add` commands.
//!
//! All directories are synced before the first `add`, so every file is in
//! the server's database by the time it is queued. Files are added in batch
//! order. Refusals for single directories or files are recorded and skipped;
//! only a broken connection ends the flush early. Nothing is rolled back.

use crate::collector::PendingBatch;
use crate::report::{DirectoryOutcome, DirectoryStatus, FileOutcome, FlushReport};
use mpdqueue_client::{
    Clock, Connector, EnqueueError, IndexSyncWaiter, MpdError, SyncError, SyncOptions,
    SystemClock,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlushError {
    /// No connection could be opened; nothing was sent.
    #[error("could not open server connection: {0}")]
    Connect(#[source] MpdError),
    /// The connection failed part way; `report` holds what completed before.
    #[error("server connection lost during flush: {source}")]
    Interrupted {
        #[source]
        source: MpdError,
        report: FlushReport,
    },
}

pub struct QueueOrchestrator<C: Connector, K: Clock = SystemClock> {
    connector: C,
    waiter: IndexSyncWaiter<K>,
}

impl<C: Connector> QueueOrchestrator<C, SystemClock> {
    pub fn new(connector: C, sync: SyncOptions) -> Self {
        Self::with_clock(connector, SystemClock, sync)
    }
}

impl<C: Connector, K: Clock> QueueOrchestrator<C, K> {
    pub fn with_clock(connector: C, clock: K, sync: SyncOptions) -> Self {
        Self {
            connector,
            waiter: IndexSyncWaiter::new(clock, sync),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Sync every parent directory of the batch, then queue each file in order.
    ///
    /// An empty batch returns an empty report without connecting.
    pub fn flush(&self, batch: PendingBatch) -> Result<FlushReport, FlushError> {
        if batch.is_empty() {
            tracing::debug!("no files to add to queue");
            return Ok(FlushReport::default());
        }

        let mut connection = self.connector.connect().map_err(FlushError::Connect)?;
        let directories = batch.directories();
        tracing::info!(
            files = batch.len(),
            directories = directories.len(),
            "adding imported files to queue"
        );

        let mut report = FlushReport::default();
        for directory in &directories {
            tracing::debug!(directory = %directory, "updating directory");
            let status = match self.waiter.sync(&mut connection, directory) {
                Ok(sync) => {
                    tracing::debug!(directory = %directory, polls = sync.polls, "finished updating");
                    DirectoryStatus::Synced { polls: sync.polls }
                }
                Err(SyncError::Rejected { response, .. }) => {
                    tracing::warn!(
                        directory = %directory,
                        response = %response.join(" | "),
                        "server refused to update directory"
                    );
                    DirectoryStatus::Rejected { response }
                }
                Err(SyncError::DeadlineExceeded { polls, waited, .. }) => {
                    tracing::warn!(
                        directory = %directory,
                        polls,
                        waited = ?waited,
                        "gave up waiting for directory update"
                    );
                    DirectoryStatus::TimedOut { polls }
                }
                Err(SyncError::Connection(source)) => {
                    return Err(FlushError::Interrupted { source, report })
                }
            };
            report
                .directories
                .push(DirectoryOutcome::new(directory.as_str(), status));
        }

        for path in batch.into_paths() {
            tracing::debug!(path = %path, "adding to queue");
            match connection.add(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path, "added to queue");
                    report.files.push(FileOutcome::added(path));
                }
                Err(EnqueueError::Rejected { response, .. }) => {
                    tracing::warn!(path = %path, response = %response, "failed to add to queue");
                    report.files.push(FileOutcome::rejected(path, response));
                }
                Err(EnqueueError::Connection(source)) => {
                    return Err(FlushError::Interrupted { source, report })
                }
            }
        }

        connection.close();
        tracing::info!(
            added = report.added().count(),
            failed = report.failed().count(),
            "queue updated"
        );
        Ok(report)
    }
}
