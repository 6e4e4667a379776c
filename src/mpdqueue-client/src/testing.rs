//! In-memory server doubles for exercising the client without a daemon.
//!
//! [`FakeMpd`] holds the scripted server behaviour and answers one command
//! line at a time. [`ScriptedTransport`] feeds it through the [`Transport`]
//! seam, and the same `FakeMpd` can sit behind a real socket in integration
//! tests.

use crate::connection::{Connection, Connector};
use crate::error::{MpdError, MpdResult};
use crate::response::Response;
use crate::sync::Clock;
use crate::transport::Transport;
use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// What the fake server does with one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Lines(Vec<String>),
    /// Answer nothing (`close`).
    Silent,
    /// Drop the connection instead of answering.
    Disconnect,
}

#[derive(Debug, Clone)]
pub struct FakeMpd {
    greeting: String,
    password: Option<String>,
    authenticated: bool,
    status_script: VecDeque<Vec<String>>,
    busy_polls_per_update: u32,
    busy_polls: u32,
    rejected_adds: HashSet<String>,
    rejected_updates: HashSet<String>,
    disconnect_on: Option<String>,
    next_job: u32,
}

impl Default for FakeMpd {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMpd {
    pub fn new() -> Self {
        Self {
            greeting: "OK MPD 0.23.5".into(),
            password: None,
            authenticated: false,
            status_script: VecDeque::new(),
            busy_polls_per_update: 0,
            busy_polls: 0,
            rejected_adds: HashSet::new(),
            rejected_updates: HashSet::new(),
            disconnect_on: None,
            next_job: 0,
        }
    }

    /// Empty string means the server says nothing at all.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Responses for the next `status` commands, in order, before falling
    /// back to the update-driven behaviour.
    pub fn with_status_sequence(mut self, sequence: Vec<Vec<&str>>) -> Self {
        self.status_script = sequence
            .into_iter()
            .map(|lines| lines.into_iter().map(String::from).collect())
            .collect();
        self
    }

    /// Each accepted `update` keeps `status` reporting `updating_db` for `polls` queries.
    pub fn busy_polls_per_update(mut self, polls: u32) -> Self {
        self.busy_polls_per_update = polls;
        self
    }

    pub fn reject_add(mut self, path: impl Into<String>) -> Self {
        self.rejected_adds.insert(path.into());
        self
    }

    pub fn reject_update(mut self, directory: impl Into<String>) -> Self {
        self.rejected_updates.insert(directory.into());
        self
    }

    /// Drop the connection when a command with this name arrives.
    pub fn disconnect_on(mut self, command: impl Into<String>) -> Self {
        self.disconnect_on = Some(command.into());
        self
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    pub fn respond(&mut self, line: &str) -> Reply {
        let (name, args) = split_command(line);
        if self.disconnect_on.as_deref() == Some(name.as_str()) {
            return Reply::Disconnect;
        }
        if name == "close" {
            return Reply::Silent;
        }
        if name == "password" {
            return match (&self.password, args.first()) {
                (Some(expected), Some(given)) if expected == given => {
                    self.authenticated = true;
                    ok()
                }
                _ => ack(3, &name, "incorrect password"),
            };
        }
        if self.password.is_some() && !self.authenticated {
            return ack(4, &name, &format!("you don't have permission for \"{name}\""));
        }

        match name.as_str() {
            "status" => self.status(),
            "update" => {
                let directory = args.first().cloned().unwrap_or_default();
                if self.rejected_updates.contains(&directory) {
                    return ack(50, &name, "Malformed path");
                }
                self.next_job += 1;
                self.busy_polls += self.busy_polls_per_update;
                Reply::Lines(vec![format!("updating_db: {}", self.next_job), "OK".into()])
            }
            "add" => match args.first() {
                Some(path) if !self.rejected_adds.contains(path) => ok(),
                Some(_) => ack(2, &name, "malformed"),
                None => ack(2, &name, "wrong number of arguments for \"add\""),
            },
            _ => ack(5, "", &format!("unknown command \"{name}\"")),
        }
    }

    fn status(&mut self) -> Reply {
        if let Some(lines) = self.status_script.pop_front() {
            return Reply::Lines(lines);
        }
        let mut lines = vec!["volume: 100".to_string(), "state: stop".to_string()];
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            lines.push(format!("updating_db: {}", self.next_job));
        }
        lines.push("OK".into());
        Reply::Lines(lines)
    }
}

fn ok() -> Reply {
    Reply::Lines(vec!["OK".into()])
}

fn ack(code: u32, command: &str, message: &str) -> Reply {
    Reply::Lines(vec![format!("ACK [{code}@0] {{{command}}} {message}")])
}

/// Split a command line into its name and unquoted arguments.
pub fn split_command(line: &str) -> (String, Vec<String>) {
    let line = line.trim();
    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    let mut args = Vec::new();
    let mut chars = rest.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(first) = chars.next() else { break };
        let mut arg = String::new();
        if first == '"' {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            arg.push(escaped);
                        }
                    }
                    '"' => break,
                    other => arg.push(other),
                }
            }
        } else {
            arg.push(first);
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                arg.push(c);
            }
        }
        args.push(arg);
    }
    (name.to_string(), args)
}

/// Shared record of the commands a fake server received.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    inner: Arc<Mutex<LogState>>,
}

#[derive(Debug, Default)]
struct LogState {
    commands: Vec<String>,
    shutdowns: usize,
}

impl CommandLog {
    pub fn record(&self, command: &str) {
        self.lock().commands.push(command.to_string());
    }

    pub fn record_shutdown(&self) {
        self.lock().shutdowns += 1;
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Commands whose name is `name`, in arrival order.
    pub fn named(&self, name: &str) -> Vec<String> {
        self.lock()
            .commands
            .iter()
            .filter(|command| split_command(command).0 == name)
            .cloned()
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.named(name).len()
    }

    /// First argument of every `name` command, unquoted.
    pub fn arguments(&self, name: &str) -> Vec<String> {
        self.named(name)
            .iter()
            .filter_map(|command| split_command(command).1.into_iter().next())
            .collect()
    }

    pub fn was_shut_down(&self) -> bool {
        self.lock().shutdowns > 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        // A panicking test thread must not hide the log from the others.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct ScriptedTransport {
    server: FakeMpd,
    pending: VecDeque<Response>,
    log: CommandLog,
    open: bool,
}

impl ScriptedTransport {
    pub fn new(server: FakeMpd, log: CommandLog) -> Self {
        let greeting = Response::from_bytes(server.greeting().as_bytes());
        Self {
            server,
            pending: VecDeque::from([greeting]),
            log,
            open: true,
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "transport shut down"));
        }
        let text = String::from_utf8_lossy(bytes);
        let command = text.trim_end_matches('\n');
        self.log.record(command);
        match self.server.respond(command) {
            Reply::Lines(lines) => self.pending.push_back(Response::from(lines)),
            Reply::Silent => {}
            Reply::Disconnect => {
                self.open = false;
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "server dropped the connection",
                ));
            }
        }
        Ok(())
    }

    fn receive_response(&mut self) -> io::Result<Response> {
        Ok(self.pending.pop_front().unwrap_or_default())
    }

    fn shutdown(&mut self) {
        self.open = false;
        self.log.record_shutdown();
    }
}

/// Connector that hands out [`ScriptedTransport`]s and counts how often it was asked.
pub struct ScriptedConnector {
    factory: Box<dyn Fn() -> FakeMpd>,
    log: CommandLog,
    password: Option<String>,
    refuse: bool,
    connections: Cell<usize>,
}

impl ScriptedConnector {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> FakeMpd + 'static,
    {
        Self {
            factory: Box::new(factory),
            log: CommandLog::default(),
            password: None,
            refuse: false,
            connections: Cell::new(0),
        }
    }

    /// Every attempt fails as if nothing listened on the port.
    pub fn refusing() -> Self {
        let mut connector = Self::new(FakeMpd::new);
        connector.refuse = true;
        connector
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    pub fn connections(&self) -> usize {
        self.connections.get()
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn connect(&self) -> MpdResult<Connection<ScriptedTransport>> {
        self.connections.set(self.connections.get() + 1);
        if self.refuse {
            return Err(MpdError::Connect {
                address: "scripted:6600".into(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            });
        }
        let transport = ScriptedTransport::new((self.factory)(), self.log.clone());
        Connection::establish(transport, self.password.as_deref())
    }
}

/// Clock whose time only moves when something sleeps on it.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
    sleeps: RefCell<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
            sleeps: RefCell::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.borrow().iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
        self.sleeps.borrow_mut().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_unquotes_arguments() {
        let (name, args) = split_command(r#"add "Say \"Hi\"/01 a\\b.flac""#);
        assert_eq!(name, "add");
        assert_eq!(args, vec![r#"Say "Hi"/01 a\b.flac"#.to_string()]);

        let (name, args) = split_command("status");
        assert_eq!(name, "status");
        assert!(args.is_empty());
    }

    #[test]
    fn locked_server_refuses_until_password() {
        let mut server = FakeMpd::new().with_password("pw");
        assert!(matches!(server.respond("status"), Reply::Lines(ref l) if l[0].starts_with("ACK [4@0]")));
        assert_eq!(server.respond("password \"pw\""), Reply::Lines(vec!["OK".into()]));
        assert!(matches!(server.respond("status"), Reply::Lines(ref l) if l.last().map(String::as_str) == Some("OK")));
    }

    #[test]
    fn update_makes_status_busy() {
        let mut server = FakeMpd::new().busy_polls_per_update(1);
        assert_eq!(
            server.respond("update \"A\""),
            Reply::Lines(vec!["updating_db: 1".into(), "OK".into()])
        );
        let busy = server.status();
        assert!(matches!(busy, Reply::Lines(ref l) if l.iter().any(|x| x == "updating_db: 1")));
        let idle = server.status();
        assert!(matches!(idle, Reply::Lines(ref l) if !l.iter().any(|x| x.starts_with("updating_db"))));
    }
}
