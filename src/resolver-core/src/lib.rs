pub mod config;
pub mod logging;
pub mod models;
pub mod paths;
pub mod redact;
pub mod resolver;
pub mod resolver_contract;
pub mod secrets;

pub use config::{
    AccountConfig, Config, ConfigError, HttpConfig, LogLevel, LoggingConfig, ServiceConfig,
    ValidationError,
};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use models::{Credentials, Quality, ResolveQuery, ResolverUrl, StreamUrl, TrackRecord};
pub use paths::{AppDirs, DirsError};
pub use resolver::{
    Capability, ConfigTestResult, Resolver, ResolverError, ResolverHost, ResolverResult,
    ResolverSettings,
};

pub const APP_NAME: &str = "rhapsody-resolver";
pub const APP_AUTHOR: &str = "RhapsodyResolver";
pub const APP_QUALIFIER: &str = "io";
