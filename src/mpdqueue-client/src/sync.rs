//! Blocking wait for server-side indexing.
//!
//! The server has no completion notification we rely on here, so after an
//! accepted `update` the waiter polls `status` until the `updating_db` line
//! disappears. Time comes from a [`Clock`] so tests never really sleep.

use crate::connection::Connection;
use crate::error::MpdError;
use crate::transport::Transport;
use mpdqueue_core::MpdConfig;
use std::time::{Duration, Instant};
use thiserror::Error;

const UPDATING_DB: &str = "updating_db";

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub poll_interval: Duration,
    /// `None` waits as long as the server keeps indexing.
    pub deadline: Option<Duration>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            deadline: None,
        }
    }
}

impl From<&MpdConfig> for SyncOptions {
    fn from(config: &MpdConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            deadline: config.sync_timeout(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// The `update` command was not acknowledged; there is nothing to wait for.
    #[error("server did not accept update of {directory:?}: {}", response.join(" | "))]
    Rejected {
        directory: String,
        response: Vec<String>,
    },
    #[error("index update of {directory:?} still running after {polls} polls ({waited:?})")]
    DeadlineExceeded {
        directory: String,
        polls: u32,
        waited: Duration,
    },
    #[error(transparent)]
    Connection(#[from] MpdError),
}

impl SyncError {
    /// Only a broken connection should stop the caller from moving on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Connection(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub directory: String,
    /// Status queries issued, including the final one that found the server idle.
    pub polls: u32,
    pub waited: Duration,
}

#[derive(Debug)]
pub enum SyncState {
    Idle,
    Syncing { polls: u32, started: Instant },
    Done { polls: u32, waited: Duration },
    Failed(SyncError),
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Done { .. } | SyncState::Failed(_))
    }
}

pub struct IndexSyncWaiter<C: Clock> {
    clock: C,
    options: SyncOptions,
}

impl<C: Clock> IndexSyncWaiter<C> {
    pub fn new(clock: C, options: SyncOptions) -> Self {
        Self { clock, options }
    }

    /// Update `directory` and block until the server has finished indexing it.
    pub fn sync<T: Transport>(
        &self,
        connection: &mut Connection<T>,
        directory: &str,
    ) -> Result<SyncReport, SyncError> {
        let mut state = SyncState::Idle;
        loop {
            state = match state {
                SyncState::Done { polls, waited } => {
                    return Ok(SyncReport {
                        directory: directory.to_string(),
                        polls,
                        waited,
                    })
                }
                SyncState::Failed(err) => return Err(err),
                pending => self.step(connection, directory, pending),
            };
        }
    }

    /// Advance the state machine by one server exchange.
    ///
    /// `Idle` issues the `update`, each `Syncing` step issues one `status`
    /// and sleeps one poll interval if indexing is still running. Terminal
    /// states are returned unchanged.
    pub fn step<T: Transport>(
        &self,
        connection: &mut Connection<T>,
        directory: &str,
        state: SyncState,
    ) -> SyncState {
        match state {
            SyncState::Idle => match connection.update(directory) {
                Ok(response) if response.last() == Some("OK") => {
                    tracing::debug!(directory, "index update accepted");
                    SyncState::Syncing {
                        polls: 0,
                        started: self.clock.now(),
                    }
                }
                Ok(response) => SyncState::Failed(SyncError::Rejected {
                    directory: directory.to_string(),
                    response: response.into_lines(),
                }),
                Err(err) => SyncState::Failed(err.into()),
            },
            SyncState::Syncing { polls, started } => {
                let status = match connection.status() {
                    Ok(status) => status,
                    Err(err) => return SyncState::Failed(err.into()),
                };
                let polls = polls + 1;
                let waited = self.clock.now().saturating_duration_since(started);
                if !status.has_prefix(UPDATING_DB) {
                    return SyncState::Done { polls, waited };
                }
                if let Some(deadline) = self.options.deadline {
                    if waited >= deadline {
                        return SyncState::Failed(SyncError::DeadlineExceeded {
                            directory: directory.to_string(),
                            polls,
                            waited,
                        });
                    }
                }
                tracing::trace!(directory, polls, "index update still running");
                self.clock.sleep(self.options.poll_interval);
                SyncState::Syncing { polls, started }
            }
            terminal => terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CommandLog, FakeMpd, ManualClock, ScriptedTransport};

    fn connect(server: FakeMpd) -> (Connection<ScriptedTransport>, CommandLog) {
        let log = CommandLog::default();
        let connection =
            Connection::establish(ScriptedTransport::new(server, log.clone()), None).expect("handshake");
        (connection, log)
    }

    #[test]
    fn polls_until_updating_line_disappears() {
        let (mut connection, log) = connect(
            FakeMpd::new().with_status_sequence(vec![vec!["updating_db: 1"], vec![]]),
        );
        let clock = ManualClock::new();
        let waiter = IndexSyncWaiter::new(&clock, SyncOptions::default());

        let report = waiter.sync(&mut connection, "Artist/Album").expect("synced");

        assert_eq!(report.polls, 2);
        assert_eq!(report.waited, Duration::from_millis(500));
        assert_eq!(log.count("status"), 2);
        assert_eq!(log.commands()[0], "update \"Artist/Album\"");
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(500)]);
    }

    #[test]
    fn idle_server_needs_one_poll_and_no_sleep() {
        let (mut connection, _) = connect(FakeMpd::new());
        let clock = ManualClock::new();
        let waiter = IndexSyncWaiter::new(&clock, SyncOptions::default());

        let report = waiter.sync(&mut connection, "Album").expect("synced");
        assert_eq!(report.polls, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn rejected_update_skips_polling() {
        let (mut connection, log) = connect(FakeMpd::new().reject_update("bad"));
        let clock = ManualClock::new();
        let waiter = IndexSyncWaiter::new(&clock, SyncOptions::default());

        let err = waiter.sync(&mut connection, "bad").expect_err("rejected");
        assert!(matches!(err, SyncError::Rejected { ref directory, .. } if directory == "bad"));
        assert!(!err.is_fatal());
        assert_eq!(log.count("status"), 0);
    }

    #[test]
    fn deadline_bounds_the_wait() {
        let (mut connection, log) = connect(FakeMpd::new().busy_polls_per_update(100));
        let clock = ManualClock::new();
        let options = SyncOptions {
            poll_interval: Duration::from_millis(500),
            deadline: Some(Duration::from_secs(1)),
        };
        let waiter = IndexSyncWaiter::new(&clock, options);

        let err = waiter.sync(&mut connection, "Huge").expect_err("deadline");
        match err {
            SyncError::DeadlineExceeded { polls, waited, .. } => {
                assert_eq!(polls, 3);
                assert_eq!(waited, Duration::from_secs(1));
            }
            other => panic!("unexpected {other}"),
        }
        assert_eq!(log.count("status"), 3);
    }

    #[test]
    fn unbounded_wait_keeps_polling() {
        let (mut connection, _) = connect(FakeMpd::new().busy_polls_per_update(40));
        let clock = ManualClock::new();
        let waiter = IndexSyncWaiter::new(&clock, SyncOptions::default());

        let report = waiter.sync(&mut connection, "Slow").expect("eventually idle");
        assert_eq!(report.polls, 41);
        assert_eq!(report.waited, Duration::from_secs(20));
    }

    #[test]
    fn step_walks_the_states() {
        let (mut connection, _) = connect(
            FakeMpd::new().with_status_sequence(vec![vec!["updating_db: 2", "OK"]]),
        );
        let clock = ManualClock::new();
        let waiter = IndexSyncWaiter::new(&clock, SyncOptions::default());

        let state = waiter.step(&mut connection, "A", SyncState::Idle);
        assert!(matches!(state, SyncState::Syncing { polls: 0, .. }));
        let state = waiter.step(&mut connection, "A", state);
        assert!(matches!(state, SyncState::Syncing { polls: 1, .. }));
        let state = waiter.step(&mut connection, "A", state);
        assert!(matches!(state, SyncState::Done { polls: 2, .. }));
        assert!(state.is_terminal());
        let state = waiter.step(&mut connection, "A", state);
        assert!(matches!(state, SyncState::Done { polls: 2, .. }));
    }

    #[test]
    fn lost_connection_is_fatal() {
        let (mut connection, _) = connect(FakeMpd::new().disconnect_on("update"));
        let waiter = IndexSyncWaiter::new(ManualClock::new(), SyncOptions::default());

        let err = waiter.sync(&mut connection, "A").expect_err("socket dropped");
        assert!(err.is_fatal());
    }

    #[test]
    fn options_follow_config() {
        let config = MpdConfig {
            poll_interval_ms: 200,
            sync_timeout_ms: Some(30_000),
            ..MpdConfig::default()
        };
        let options = SyncOptions::from(&config);
        assert_eq!(options.poll_interval, Duration::from_millis(200));
        assert_eq!(options.deadline, Some(Duration::from_secs(30)));
    }
}
