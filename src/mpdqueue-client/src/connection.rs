use crate::error::{EnqueueError, MpdError, MpdResult};
use crate::response::Response;
use crate::transport::{ConnectionOptions, TcpTransport, Transport};
use mpdqueue_core::redact::redact_secrets;
use mpdqueue_core::ServerEndpoint;

const GREETING_PREFIX: &str = "OK MPD";

/// One authenticated session. Strictly one command in flight at a time.
///
/// Any socket failure leaves the connection closed for good; callers discard
/// it and open a new one.
pub struct Connection<T: Transport> {
    transport: T,
    server_version: String,
    ready: bool,
}

impl Connection<TcpTransport> {
    pub fn connect(endpoint: &ServerEndpoint, options: &ConnectionOptions) -> MpdResult<Self> {
        let transport = TcpTransport::connect(endpoint.host(), endpoint.port(), options)?;
        tracing::debug!(server = %endpoint, "connected");
        Self::establish(transport, endpoint.password())
    }
}

impl<T: Transport> Connection<T> {
    /// Run the greeting check and optional password exchange over `transport`.
    pub fn establish(transport: T, password: Option<&str>) -> MpdResult<Self> {
        let mut connection = Self {
            transport,
            server_version: String::new(),
            ready: true,
        };

        let greeting = connection.receive()?;
        match greeting.first() {
            Some(line) if line.starts_with(GREETING_PREFIX) => {
                connection.server_version = line[GREETING_PREFIX.len()..].trim().to_string();
            }
            other => {
                let greeting = other.map(str::to_string);
                connection.close_in_place();
                return Err(MpdError::Handshake { greeting });
            }
        }

        if let Some(password) = password {
            let response = connection.command(&format!("password {}", quote_argument(password)))?;
            match response.first() {
                Some(line) if line.starts_with("OK") => {}
                other => {
                    let response = other.map(str::to_string);
                    connection.close_in_place();
                    return Err(MpdError::Authentication { response });
                }
            }
        }

        tracing::debug!(version = %connection.server_version, "session ready");
        Ok(connection)
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Write one command, adding the trailing newline if missing.
    pub fn send(&mut self, command: &str) -> MpdResult<()> {
        if !self.ready {
            return Err(MpdError::Closed);
        }
        tracing::trace!(command = %redact_secrets(command.trim_end()), "sending command");
        let mut line = command.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        let result = self.transport.send(line.as_bytes());
        result.map_err(|err| self.fail(err))
    }

    /// One read cycle; see [`crate::response::read_until_idle`].
    pub fn receive(&mut self) -> MpdResult<Response> {
        if !self.ready {
            return Err(MpdError::Closed);
        }
        let result = self.transport.receive_response();
        let response = result.map_err(|err| self.fail(err))?;
        tracing::trace!(lines = response.len(), "received response");
        Ok(response)
    }

    pub fn command(&mut self, command: &str) -> MpdResult<Response> {
        self.send(command)?;
        self.receive()
    }

    /// Append `path` to the play queue. Only a first line of exactly `OK` counts as success.
    pub fn add(&mut self, path: &str) -> Result<(), EnqueueError> {
        let response = self.command(&format!("add {}", quote_argument(path)))?;
        match response.first() {
            Some("OK") => Ok(()),
            other => Err(EnqueueError::Rejected {
                path: path.to_string(),
                response: other.unwrap_or_default().to_string(),
            }),
        }
    }

    /// Raw `status` lines; an `updating_db` line means indexing is still running.
    pub fn status(&mut self) -> MpdResult<Response> {
        self.command("status")
    }

    /// Ask the server to rescan `directory`. Acceptance is judged by the caller.
    pub fn update(&mut self, directory: &str) -> MpdResult<Response> {
        self.command(&format!("update {}", quote_argument(directory)))
    }

    pub fn close(mut self) {
        self.close_in_place();
    }

    fn close_in_place(&mut self) {
        if !self.ready {
            return;
        }
        if let Err(err) = self.transport.send(b"close\n") {
            tracing::debug!(error = %err, "close command not delivered");
        }
        self.transport.shutdown();
        self.ready = false;
    }

    fn fail(&mut self, err: std::io::Error) -> MpdError {
        tracing::debug!(error = %err, "connection failed");
        self.transport.shutdown();
        self.ready = false;
        MpdError::Io(err)
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.close_in_place();
    }
}

/// Quote a command argument, escaping `\` and `"` with a backslash.
///
/// ```
/// use mpdqueue_client::quote_argument;
///
/// assert_eq!(quote_argument(r#"Say "Hi"/01.flac"#), r#""Say \"Hi\"/01.flac""#);
/// ```
pub fn quote_argument(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Opens connections for callers that should not care how.
pub trait Connector {
    type Transport: Transport;

    fn connect(&self) -> MpdResult<Connection<Self::Transport>>;
}

#[derive(Debug, Clone)]
pub struct TcpConnector {
    endpoint: ServerEndpoint,
    options: ConnectionOptions,
}

impl TcpConnector {
    pub fn new(endpoint: ServerEndpoint, options: ConnectionOptions) -> Self {
        Self { endpoint, options }
    }
}

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn connect(&self) -> MpdResult<Connection<TcpTransport>> {
        Connection::connect(&self.endpoint, &self.options)
    }
}
