//! Account password storage using the OS keyring.
//!
//! Entries live under the service name "rhapsody-resolver" and are keyed by
//! resolver id plus account email, so the password never has to sit in
//! `config.toml`.

use thiserror::Error;

/// Service name used for all entries in the OS keyring.
const SERVICE_NAME: &str = crate::APP_NAME;

/// Errors that can occur when accessing the credential store.
#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("credential not found: {key}")]
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

/// Credential store backed by the OS keyring.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    service: String,
    resolver: String,
}

impl CredentialStore {
    pub fn new(resolver: impl Into<String>) -> Self {
        Self {
            service: SERVICE_NAME.into(),
            resolver: resolver.into(),
        }
    }

    fn build_key(resolver: &str, email: &str) -> String {
        format!("{}/{}/password", resolver, email.trim().to_ascii_lowercase())
    }

    fn entry(&self, email: &str) -> SecretsResult<(String, keyring::Entry)> {
        let key = Self::build_key(&self.resolver, email);
        let entry = keyring::Entry::new(&self.service, &key)?;
        Ok((key, entry))
    }

    pub fn store_password(&self, email: &str, password: &str) -> SecretsResult<()> {
        let (_, entry) = self.entry(email)?;
        entry.set_password(password)?;
        tracing::debug!(resolver = %self.resolver, "stored account password in keyring");
        Ok(())
    }

    /// Returns `SecretsError::NotFound` if no password is stored for `email`.
    pub fn get_password(&self, email: &str) -> SecretsResult<String> {
        let (key, entry) = self.entry(email)?;
        match entry.get_password() {
            Ok(secret) => Ok(secret),
            Err(keyring::Error::NoEntry) => Err(SecretsError::NotFound { key }),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`get_password`](Self::get_password) but treats every failure as
    /// "no password"; callers fall back to a downgraded resolver.
    pub fn find_password(&self, email: &str) -> Option<String> {
        match self.get_password(email) {
            Ok(password) => Some(password),
            Err(SecretsError::NotFound { .. }) => None,
            Err(e) => {
                tracing::warn!(error = %e, "keyring lookup failed");
                None
            }
        }
    }

    /// Returns `Ok(())` even if nothing was stored.
    pub fn delete_password(&self, email: &str) -> SecretsResult<()> {
        let (_, entry) = self.entry(email)?;
        match entry.delete_credential() {
            Ok(()) => {
                tracing::debug!(resolver = %self.resolver, "deleted account password from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
