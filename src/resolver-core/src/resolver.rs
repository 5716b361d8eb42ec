use crate::models::{Credentials, ResolveQuery, StreamUrl, TrackRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Capability a resolver reports to the host after reading its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    /// Resolver is unusable with the current configuration.
    NullCapability,
    /// Resolver can turn its own internal URLs into stream URLs.
    UrlLookup,
}

/// Outcome of testing candidate account settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigTestResult {
    Success,
    InvalidCredentials,
    CommunicationError,
}

/// Common categories of resolver failures surfaced to the host.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverError {
    #[error("resolver is not configured")]
    ConfigurationMissing,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },
    #[error("lookup failed: {message}")]
    LookupFailed { message: String },
    #[error("communication error: {message}")]
    Communication {
        status: Option<u16>,
        message: String,
    },
}

pub type ResolverResult<T> = Result<T, ResolverError>;

/// Static metadata the host uses to rank and time out a resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSettings {
    pub name: String,
    /// Ranking weight against other resolvers (0-100).
    pub weight: u8,
    /// Per-request timeout the host should apply.
    pub timeout: Duration,
    /// How long the host may cache results.
    pub cache_time: Duration,
    pub icon: Option<String>,
}

/// Services the host offers to a resolver.
pub trait ResolverHost: Send + Sync {
    /// Current user configuration as stored by the host.
    fn user_config(&self) -> Credentials;

    fn report_capabilities(&self, capability: Capability);
}

/// Resolver interface.
///
/// Resolvers return **stream URLs only**; playback is handled by the host.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    fn settings(&self) -> &ResolverSettings;

    /// Reads the host configuration, reports capabilities and starts any
    /// background login. Must not fail; problems downgrade capabilities.
    async fn init(&self);

    /// Called by the host after the user saved new settings.
    async fn new_config_saved(&self, config: Credentials);

    /// Validates candidate settings without changing the active ones.
    async fn test_config(&self, config: &Credentials) -> ConfigTestResult;

    /// Turns an internal URL into a playable stream URL. URLs the resolver
    /// does not own are returned unchanged.
    async fn get_stream_url(&self, url: &str) -> ResolverResult<StreamUrl>;

    async fn search(&self, query: &str) -> ResolverResult<Vec<TrackRecord>>;

    async fn resolve(&self, query: &ResolveQuery) -> ResolverResult<Vec<TrackRecord>> {
        self.search(&query.search_text()).await
    }
}
