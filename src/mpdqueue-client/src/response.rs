//! Idle-timeout framing.
//!
//! The protocol gives no length prefix, so one response is whatever arrives
//! before the socket stays quiet for a full read timeout (or the peer closes).
//! Every exchange therefore costs up to one timeout window of latency.

use std::io::{self, ErrorKind, Read};

const READ_CHUNK: usize = 1024;

/// Lines produced by one read cycle. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    lines: Vec<String>,
}

impl Response {
    /// Decode, strip trailing whitespace and split on newlines.
    pub fn from_bytes(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let text = text.trim_end();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            lines: text
                .split('\n')
                .map(|line| line.trim_end_matches('\r').to_string())
                .collect(),
        }
    }

    pub fn first(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True if any line starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.lines.iter().any(|line| line.starts_with(prefix))
    }
}

impl From<Vec<String>> for Response {
    fn from(lines: Vec<String>) -> Self {
        Self { lines }
    }
}

/// Read until the reader times out or reports end of stream.
///
/// `reader` must have a read timeout configured; a reader that blocks
/// forever makes this block forever too.
pub fn read_until_idle<R: Read + ?Sized>(reader: &mut R) -> io::Result<Response> {
    let mut data = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => data.extend_from_slice(&chunk[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Response::from_bytes(&data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Hands out scripted chunks, then times out like an idle socket.
    struct ChunkedReader {
        steps: VecDeque<io::Result<Vec<u8>>>,
    }

    impl ChunkedReader {
        fn new(steps: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(ErrorKind::WouldBlock, "idle")),
            }
        }
    }

    #[test]
    fn single_ok_then_timeout() {
        let mut reader = ChunkedReader::new(vec![Ok(b"OK\n".to_vec())]);
        let response = read_until_idle(&mut reader).expect("read");
        assert_eq!(response.lines(), ["OK".to_string()]);
    }

    #[test]
    fn nothing_before_timeout_is_empty() {
        let mut reader = ChunkedReader::new(vec![]);
        let response = read_until_idle(&mut reader).expect("read");
        assert!(response.is_empty());
        assert_eq!(response.first(), None);
    }

    #[test]
    fn chunks_are_joined_across_reads() {
        let mut reader = ChunkedReader::new(vec![
            Ok(b"volume: 10".to_vec()),
            Ok(b"0\nupdating_db: 3\n".to_vec()),
            Err(io::Error::new(ErrorKind::Interrupted, "signal")),
            Ok(b"OK\n".to_vec()),
            Err(io::Error::new(ErrorKind::TimedOut, "idle")),
            Ok(b"never read\n".to_vec()),
        ]);
        let response = read_until_idle(&mut reader).expect("read");
        assert_eq!(response.len(), 3);
        assert_eq!(response.first(), Some("volume: 100"));
        assert!(response.has_prefix("updating_db"));
        assert_eq!(response.last(), Some("OK"));
    }

    #[test]
    fn end_of_stream_finishes_cycle() {
        let mut reader = ChunkedReader::new(vec![Ok(b"OK MPD 0.23.5\n".to_vec()), Ok(Vec::new())]);
        let response = read_until_idle(&mut reader).expect("read");
        assert_eq!(response.first(), Some("OK MPD 0.23.5"));
    }

    #[test]
    fn hard_errors_propagate() {
        let mut reader = ChunkedReader::new(vec![Err(io::Error::new(
            ErrorKind::ConnectionReset,
            "reset",
        ))]);
        let err = read_until_idle(&mut reader).expect_err("reset should surface");
        assert_eq!(err.kind(), ErrorKind::ConnectionReset);
    }

    #[test]
    fn crlf_and_trailing_whitespace_are_trimmed() {
        let response = Response::from_bytes(b"OK MPD 0.24.0\r\n\n  ");
        assert_eq!(response.lines(), ["OK MPD 0.24.0".to_string()]);
    }
}
