//! Server password storage in the OS keyring.
//!
//! Passwords are stored under the service name "mpdqueue" with one entry per
//! `host:port`, so a password never has to live in `config.toml`.

use crate::models::ServerEndpoint;
use thiserror::Error;

const SERVICE_NAME: &str = "mpdqueue";

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("no stored password for {key}")]
    NotFound { key: String },

    #[error("keyring access denied: {0}")]
    AccessDenied(String),

    #[error("keyring unavailable: {0}")]
    Unavailable(String),

    #[error("keyring error: {0}")]
    Other(String),
}

impl From<keyring::Error> for SecretsError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoEntry => SecretsError::NotFound {
                key: "unknown".into(),
            },
            keyring::Error::NoStorageAccess(e) => SecretsError::AccessDenied(e.to_string()),
            keyring::Error::PlatformFailure(e) => SecretsError::Unavailable(e.to_string()),
            other => SecretsError::Other(other.to_string()),
        }
    }
}

pub type SecretsResult<T> = Result<T, SecretsError>;

/// Keyring-backed store for server passwords.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    service: String,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.into(),
        }
    }

    fn key_for(host: &str, port: u16) -> String {
        format!("{}:{}", host.to_ascii_lowercase(), port)
    }

    fn entry(&self, host: &str, port: u16) -> SecretsResult<(keyring::Entry, String)> {
        let key = Self::key_for(host, port);
        let entry = keyring::Entry::new(&self.service, &key)?;
        Ok((entry, key))
    }

    pub fn store_password(&self, host: &str, port: u16, password: &str) -> SecretsResult<()> {
        let (entry, key) = self.entry(host, port)?;
        entry.set_password(password)?;
        tracing::debug!(server = %key, "stored server password in keyring");
        Ok(())
    }

    /// Returns `SecretsError::NotFound` when nothing is stored for the server.
    pub fn get_password(&self, host: &str, port: u16) -> SecretsResult<String> {
        let (entry, key) = self.entry(host, port)?;
        match entry.get_password() {
            Ok(secret) => Ok(secret),
            Err(keyring::Error::NoEntry) => Err(SecretsError::NotFound { key }),
            Err(e) => Err(e.into()),
        }
    }

    /// Succeeds even if nothing was stored.
    pub fn delete_password(&self, host: &str, port: u16) -> SecretsResult<()> {
        let (entry, key) = self.entry(host, port)?;
        match entry.delete_credential() {
            Ok(()) => {
                tracing::debug!(server = %key, "deleted server password from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Fill in the endpoint's password from the keyring if it has none.
    ///
    /// A missing entry is not an error; keyring failures are logged and the
    /// endpoint is returned unchanged.
    pub fn complete_endpoint(&self, endpoint: ServerEndpoint) -> ServerEndpoint {
        if endpoint.password().is_some() {
            return endpoint;
        }
        match self.get_password(endpoint.host(), endpoint.port()) {
            Ok(password) => endpoint.with_password(Some(password)),
            Err(SecretsError::NotFound { .. }) => endpoint,
            Err(err) => {
                tracing::warn!(server = %endpoint, error = %err, "could not read password from keyring");
                endpoint
            }
        }
    }
}
