pub mod config;
pub mod logging;
pub mod models;
pub mod paths;
pub mod redact;
pub mod secrets;

pub use config::{Config, ConfigError, LogLevel, LoggingConfig, MpdConfig, ValidationError};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use models::{EndpointError, ImportUnit, ImportedFile, ServerEndpoint, DEFAULT_PORT};
pub use paths::{AppDirs, DirsError};

pub const APP_NAME: &str = "mpdqueue";
pub const APP_AUTHOR: &str = "mpdqueue";
pub const APP_QUALIFIER: &str = "io";
