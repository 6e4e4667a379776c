use crate::error::MpdError;
use crate::response::{read_until_idle, Response};
use mpdqueue_core::MpdConfig;
use std::io::{self, ErrorKind, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Byte pipe to the server plus the framing that cuts it into responses.
///
/// The framing lives behind `receive_response` so a terminator-aware reader
/// can replace idle-timeout framing without touching `Connection`.
pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn receive_response(&mut self) -> io::Result<Response>;
    /// Best effort; the transport is discarded afterwards.
    fn shutdown(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Quiet period that ends one response.
    pub read_timeout: Duration,
    /// `None` leaves connecting to the operating system's own timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(250),
            connect_timeout: None,
        }
    }
}

impl From<&MpdConfig> for ConnectionOptions {
    fn from(config: &MpdConfig) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn connect(host: &str, port: u16, options: &ConnectionOptions) -> Result<Self, MpdError> {
        let address = format!("{host}:{port}");
        let stream = match options.connect_timeout {
            None => TcpStream::connect((host, port)).map_err(|source| MpdError::Connect {
                address: address.clone(),
                source,
            })?,
            Some(timeout) => connect_with_timeout(host, port, timeout, &address)?,
        };
        Self::from_stream(stream, options.read_timeout).map_err(|source| MpdError::Connect {
            address,
            source,
        })
    }

    /// Wrap an already connected stream, applying the idle read timeout.
    pub fn from_stream(stream: TcpStream, read_timeout: Duration) -> io::Result<Self> {
        stream.set_read_timeout(Some(read_timeout))?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }
}

fn connect_with_timeout(
    host: &str,
    port: u16,
    timeout: Duration,
    address: &str,
) -> Result<TcpStream, MpdError> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| MpdError::Connect {
            address: address.to_string(),
            source,
        })?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    match last_err {
        Some(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
            Err(MpdError::ConnectTimeout {
                address: address.to_string(),
                timeout,
            })
        }
        Some(source) => Err(MpdError::Connect {
            address: address.to_string(),
            source,
        }),
        None => Err(MpdError::Connect {
            address: address.to_string(),
            source: io::Error::new(ErrorKind::NotFound, "host resolved to no addresses"),
        }),
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn receive_response(&mut self) -> io::Result<Response> {
        read_until_idle(&mut self.stream)
    }

    fn shutdown(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn options_follow_config() {
        let config = MpdConfig {
            read_timeout_ms: 80,
            connect_timeout_ms: Some(1500),
            ..MpdConfig::default()
        };
        let options = ConnectionOptions::from(&config);
        assert_eq!(options.read_timeout, Duration::from_millis(80));
        assert_eq!(options.connect_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn tcp_round_trip_uses_idle_framing() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            stream.write_all(b"OK MPD 0.23.5\n").expect("greet");
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).expect("read command");
            stream.write_all(b"OK\n").expect("reply");
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let options = ConnectionOptions {
            read_timeout: Duration::from_millis(100),
            connect_timeout: Some(Duration::from_secs(5)),
        };
        let mut transport = TcpTransport::connect("127.0.0.1", port, &options).expect("connect");
        let greeting = transport.receive_response().expect("greeting");
        assert_eq!(greeting.first(), Some("OK MPD 0.23.5"));

        transport.send(b"status\n").expect("send");
        let reply = transport.receive_response().expect("reply");
        assert_eq!(reply.lines(), ["OK".to_string()]);
        transport.shutdown();

        assert_eq!(server.join().expect("server thread"), "status\n");
    }

    #[test]
    fn refused_connection_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let result = TcpTransport::connect("127.0.0.1", port, &ConnectionOptions::default());
        assert!(matches!(result, Err(MpdError::Connect { .. })));
    }
}
