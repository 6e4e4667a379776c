use crate::models::{EndpointError, ServerEndpoint, DEFAULT_PORT};
use crate::paths::AppDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CURRENT_CONFIG_VERSION: u32 = 1;
const DEFAULT_HOST: &str = "localhost";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default)]
    pub mpd: MpdConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            mpd: MpdConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Server connection settings (the `[mpd]` table).
#[derive(Clone, Serialize, Deserialize)]
pub struct MpdConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Upper bound on a single directory's index sync. Unset waits forever.
    #[serde(default)]
    pub sync_timeout_ms: Option<u64>,
    /// Library root used to turn absolute file paths into server URIs.
    #[serde(default)]
    pub music_directory: Option<PathBuf>,
}

impl Default for MpdConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            password: None,
            read_timeout_ms: default_read_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_ms: None,
            sync_timeout_ms: None,
            music_directory: None,
        }
    }
}

impl fmt::Debug for MpdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpdConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("read_timeout_ms", &self.read_timeout_ms)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("sync_timeout_ms", &self.sync_timeout_ms)
            .field("music_directory", &self.music_directory)
            .finish()
    }
}

impl MpdConfig {
    /// Resolve the endpoint from the file values, falling back to `MPD_HOST`
    /// and `MPD_PORT` from `env`, then to `localhost:6600`.
    ///
    /// `MPD_HOST` accepts the `password@host` form; that password is used only
    /// when the file sets none.
    pub fn endpoint<F>(&self, env: F) -> Result<ServerEndpoint, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (env_password, env_host) = match env("MPD_HOST").filter(|v| !v.is_empty()) {
            Some(value) => match value.rsplit_once('@') {
                Some((password, host)) => (Some(password.to_string()), Some(host.to_string())),
                None => (None, Some(value)),
            },
            None => (None, None),
        };

        let host = self
            .host
            .clone()
            .or(env_host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match self.port {
            Some(port) => port,
            None => match env("MPD_PORT") {
                Some(raw) => raw
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| ValidationError::InvalidPortVariable(raw.clone()))?,
                None => DEFAULT_PORT,
            },
        };

        let password = self.password.clone().or(env_password);
        ServerEndpoint::new(host, port, password).map_err(ValidationError::Endpoint)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn sync_timeout(&self) -> Option<Duration> {
        self.sync_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default = "default_stderr_enabled")]
    pub stderr: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            stderr: default_stderr_enabled(),
            file_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config validation failed: {0}")]
    Validation(ValidationError),
    #[error("failed to prepare configuration directories: {0}")]
    Directories(#[from] crate::paths::DirsError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("mpd.{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("MPD_PORT is not a valid port number: {0:?}")]
    InvalidPortVariable(String),
    #[error("{0}")]
    Endpoint(EndpointError),
}

impl Config {
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        Self::load_from(&dirs.config_file())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        if self.mpd.read_timeout_ms == 0 {
            return Err(ValidationError::ZeroDuration {
                field: "read_timeout_ms",
            });
        }
        if self.mpd.poll_interval_ms == 0 {
            return Err(ValidationError::ZeroDuration {
                field: "poll_interval_ms",
            });
        }
        if self.mpd.port == Some(0) {
            return Err(ValidationError::Endpoint(EndpointError::InvalidPort));
        }
        Ok(())
    }
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_read_timeout_ms() -> u64 {
    250
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

fn default_stderr_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mpd.read_timeout(), Duration::from_millis(250));
        assert_eq!(config.mpd.poll_interval(), Duration::from_millis(500));
        assert!(config.mpd.sync_timeout().is_none());
        assert!(config.logging.stderr);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn invalid_version_rejected() {
        let mut config = Config::default();
        config.config_version = CURRENT_CONFIG_VERSION + 1;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn zero_read_timeout_rejected() {
        let mut config = Config::default();
        config.mpd.read_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::ZeroDuration {
                field: "read_timeout_ms"
            })
        ));
    }

    #[test]
    fn endpoint_defaults_to_localhost() {
        let endpoint = MpdConfig::default().endpoint(env_of(&[])).expect("endpoint");
        assert_eq!(endpoint.host(), "localhost");
        assert_eq!(endpoint.port(), 6600);
        assert_eq!(endpoint.password(), None);
    }

    #[test]
    fn endpoint_reads_mpd_host_with_password() {
        let endpoint = MpdConfig::default()
            .endpoint(env_of(&[("MPD_HOST", "hunter2@music.lan"), ("MPD_PORT", "6601")]))
            .expect("endpoint");
        assert_eq!(endpoint.host(), "music.lan");
        assert_eq!(endpoint.port(), 6601);
        assert_eq!(endpoint.password(), Some("hunter2"));
    }

    #[test]
    fn file_values_take_precedence_over_env() {
        let mpd = MpdConfig {
            host: Some("box".into()),
            port: Some(7000),
            password: Some("from-file".into()),
            ..MpdConfig::default()
        };
        let endpoint = mpd
            .endpoint(env_of(&[("MPD_HOST", "env-secret@elsewhere"), ("MPD_PORT", "1")]))
            .expect("endpoint");
        assert_eq!(endpoint.host(), "box");
        assert_eq!(endpoint.port(), 7000);
        assert_eq!(endpoint.password(), Some("from-file"));
    }

    #[test]
    fn bad_mpd_port_is_reported() {
        let result = MpdConfig::default().endpoint(env_of(&[("MPD_PORT", "sixty")]));
        assert!(matches!(
            result,
            Err(ValidationError::InvalidPortVariable(ref raw)) if raw == "sixty"
        ));
    }

    #[test]
    fn debug_output_redacts_password() {
        let mpd = MpdConfig {
            password: Some("seekrit".into()),
            ..MpdConfig::default()
        };
        let debug = format!("{mpd:?}");
        assert!(!debug.contains("seekrit"));
    }

    #[test]
    fn loads_mpd_table_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[mpd]\nhost = \"jukebox\"\nport = 6601\nsync_timeout_ms = 60000\n\n[logging]\nlevel = \"debug\"\n",
        )
        .expect("write config");

        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.mpd.host.as_deref(), Some("jukebox"));
        assert_eq!(config.mpd.port, Some(6601));
        assert_eq!(config.mpd.sync_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.mpd.read_timeout_ms, 250);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join("absent.toml")).expect("defaults");
        assert_eq!(config.config_version, CURRENT_CONFIG_VERSION);
    }
}
