use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Port the Music Player Daemon listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 6600;

/// Where to reach the server, plus the optional password sent after the handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    host: String,
    port: u16,
    password: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("server host must not be empty")]
    EmptyHost,
    #[error("server port must be between 1 and 65535")]
    InvalidPort,
}

impl ServerEndpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        password: Option<String>,
    ) -> Result<Self, EndpointError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        if port == 0 {
            return Err(EndpointError::InvalidPort);
        }
        Ok(Self {
            host,
            port,
            password: password.filter(|p| !p.is_empty()),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }
}

impl fmt::Debug for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One file produced by an import, addressed relative to the server's music directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedFile {
    pub path: String,
    #[serde(default)]
    pub track_number: u32,
}

impl ImportedFile {
    pub fn new(path: impl Into<String>, track_number: u32) -> Self {
        Self {
            path: path.into(),
            track_number,
        }
    }
}

/// Files delivered by one import event.
///
/// Units without a (non-empty) `top_level_path` describe a re-scan of content the library
/// already knows about rather than freshly imported music.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportUnit {
    #[serde(default)]
    pub top_level_path: Option<PathBuf>,
    #[serde(default)]
    pub files: Vec<ImportedFile>,
}

impl ImportUnit {
    pub fn fresh(top_level_path: impl Into<PathBuf>, files: Vec<ImportedFile>) -> Self {
        Self {
            top_level_path: Some(top_level_path.into()),
            files,
        }
    }

    pub fn rescan(files: Vec<ImportedFile>) -> Self {
        Self {
            top_level_path: None,
            files,
        }
    }

    pub fn is_fresh_import(&self) -> bool {
        self.top_level_path
            .as_ref()
            .is_some_and(|path| !path.as_os_str().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_rejects_empty_host_and_zero_port() {
        assert_eq!(
            ServerEndpoint::new("  ", 6600, None),
            Err(EndpointError::EmptyHost)
        );
        assert_eq!(
            ServerEndpoint::new("localhost", 0, None),
            Err(EndpointError::InvalidPort)
        );
    }

    #[test]
    fn endpoint_debug_hides_password() {
        let endpoint =
            ServerEndpoint::new("music.lan", 6601, Some("seekrit".into())).expect("valid");
        let debug = format!("{endpoint:?}");
        assert!(!debug.contains("seekrit"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(endpoint.to_string(), "music.lan:6601");
    }

    #[test]
    fn empty_password_is_treated_as_absent() {
        let endpoint = ServerEndpoint::new("localhost", 6600, Some(String::new())).expect("valid");
        assert_eq!(endpoint.password(), None);
    }

    #[test]
    fn import_unit_deserializes_without_top_level_path() {
        let unit: ImportUnit =
            toml::from_str("files = [{ path = \"a/b.flac\", track_number = 2 }]").expect("parse");
        assert!(!unit.is_fresh_import());
        assert_eq!(unit.files[0], ImportedFile::new("a/b.flac", 2));
    }

    #[test]
    fn empty_top_level_path_is_not_a_fresh_import() {
        assert!(!ImportUnit::fresh("", vec![ImportedFile::new("a/b.flac", 1)]).is_fresh_import());
        assert!(ImportUnit::fresh("/incoming/album", Vec::new()).is_fresh_import());
    }
}
