use crate::models::{Credentials, Quality};
use crate::paths::AppDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            logging: LoggingConfig::default(),
            account: AccountConfig::default(),
            http: HttpConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    /// Mirror log lines to stderr. Stdout is reserved for the plugin protocol.
    #[serde(default = "default_console_enabled")]
    pub console: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            console: default_console_enabled(),
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

/// Streaming account. The password may be left out of the file and kept in
/// the OS keyring instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub quality: Quality,
}

impl AccountConfig {
    /// Builds host credentials, taking the password from `fallback_password`
    /// when the file does not carry one.
    pub fn credentials(&self, fallback_password: Option<String>) -> Credentials {
        let password = self
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .or(fallback_password)
            .unwrap_or_default();
        Credentials {
            email: self.email.clone().unwrap_or_default(),
            password,
            quality: self.quality,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Optional overrides for the streaming service's endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub client_script_url: Option<String>,
    #[serde(default)]
    pub direct_base_url: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

impl ServiceConfig {
    fn overrides(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("client_script_url", self.client_script_url.as_deref()),
            ("direct_base_url", self.direct_base_url.as_deref()),
            ("api_base_url", self.api_base_url.as_deref()),
            ("origin", self.origin.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
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

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("http.timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("service.{field} must be an http(s) URL, got {value}")]
    InvalidServiceUrl { field: String, value: String },
}

impl Config {
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        let path = Self::config_path(dirs);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
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

    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        if self.http.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        for (field, value) in self.service.overrides() {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ValidationError::InvalidServiceUrl {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

fn default_console_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.max_log_files, 7);
        assert!(config.logging.console);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.http.timeout(), Duration::from_secs(15));
        assert_eq!(config.account.quality, Quality::Normal);
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
    fn zero_timeout_rejected() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert_eq!(config.validate(), Err(ValidationError::ZeroTimeout));
    }

    #[test]
    fn service_override_must_be_http() {
        let mut config = Config::default();
        config.service.api_base_url = Some("ftp://api.example.com".into());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidServiceUrl { field, .. }) if field == "api_base_url"
        ));
    }

    #[test]
    fn loads_account_section_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
config_version = 1

[account]
email = "listener@example.com"
quality = 2

[http]
timeout_secs = 30
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).expect("config should load");
        assert_eq!(config.account.email.as_deref(), Some("listener@example.com"));
        assert_eq!(config.account.quality, Quality::High);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.connect_timeout_secs, 10);
    }

    #[test]
    fn parse_error_names_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "config_version = \"one\"").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn password_falls_back_when_missing() {
        let account = AccountConfig {
            email: Some("listener@example.com".into()),
            password: None,
            quality: Quality::Low,
        };
        let creds = account.credentials(Some("from-keyring".into()));
        assert_eq!(creds.password, "from-keyring");
        assert!(creds.is_complete());

        let account = AccountConfig {
            password: Some("in-file".into()),
            ..account
        };
        assert_eq!(account.credentials(Some("ignored".into())).password, "in-file");
    }
}
