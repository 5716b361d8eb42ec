//! Plugin protocol types for resolver plugins.
//!
//! This module defines the JSON-based request/response protocol a host uses
//! to drive a resolver running in a separate process.

use resolver_core::models::{Credentials, ResolveQuery, TrackRecord};
use resolver_core::resolver::{Capability, ConfigTestResult, ResolverError, ResolverSettings};
use serde::{Deserialize, Serialize};

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u32 = 1;

/// Request sent from the host to a plugin process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    /// Unique request ID for correlation.
    pub id: u64,
    /// The method to invoke on the plugin.
    pub method: PluginMethod,
}

/// Response from a plugin process to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResponse {
    /// Request ID this response correlates to.
    pub id: u64,
    /// The result of the method invocation.
    pub result: PluginResult,
}

impl PluginResponse {
    pub fn error(id: u64, error: PluginError) -> Self {
        Self {
            id,
            result: PluginResult::Error(error),
        }
    }
}

/// Methods that can be invoked on a plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum PluginMethod {
    /// Return plugin metadata and resolver settings.
    Initialize,
    /// Hand the stored user configuration to the resolver and start it.
    Init { config: Credentials },
    /// The user saved new settings.
    NewConfigSaved { config: Credentials },
    /// Check candidate settings without applying them.
    TestConfig { config: Credentials },
    /// Free-text track search.
    Search { query: String },
    /// Artist/track lookup.
    Resolve { query: ResolveQuery },
    /// Turn an internal URL into a playable one.
    GetStreamUrl { url: String },
    /// Shutdown the plugin gracefully.
    Shutdown,
}

impl PluginMethod {
    pub fn name(&self) -> &'static str {
        match self {
            PluginMethod::Initialize => "Initialize",
            PluginMethod::Init { .. } => "Init",
            PluginMethod::NewConfigSaved { .. } => "NewConfigSaved",
            PluginMethod::TestConfig { .. } => "TestConfig",
            PluginMethod::Search { .. } => "Search",
            PluginMethod::Resolve { .. } => "Resolve",
            PluginMethod::GetStreamUrl { .. } => "GetStreamUrl",
            PluginMethod::Shutdown => "Shutdown",
        }
    }
}

/// Result of a plugin method invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum PluginResult {
    /// Successful initialization.
    Initialized(PluginInfo),
    /// Capability reported after the configuration was applied.
    Capability { capability: Capability },
    /// Outcome of a configuration test.
    ConfigTest { result: ConfigTestResult },
    /// Track search or resolve results, in service order.
    Tracks { tracks: Vec<TrackRecord> },
    /// Stream URL.
    StreamUrl { url: String },
    /// Request handled, nothing to report.
    Ack,
    /// Shutdown acknowledged.
    ShutdownAck,
    /// Error response.
    Error(PluginError),
}

/// Plugin initialization info returned after Initialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin's unique identifier.
    pub id: String,
    /// Human-friendly name.
    pub name: String,
    /// Plugin version (semantic versioning).
    pub version: String,
    /// Protocol version the plugin supports.
    pub protocol_version: u32,
    pub weight: u8,
    pub timeout_secs: u64,
    pub cache_time_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl PluginInfo {
    pub fn new(id: impl Into<String>, version: impl Into<String>, settings: &ResolverSettings) -> Self {
        Self {
            id: id.into(),
            name: settings.name.clone(),
            version: version.into(),
            protocol_version: PROTOCOL_VERSION,
            weight: settings.weight,
            timeout_secs: settings.timeout.as_secs(),
            cache_time_secs: settings.cache_time.as_secs(),
            icon: settings.icon.clone(),
        }
    }
}

/// Error returned by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginError {
    /// Error category for consistent handling.
    pub kind: PluginErrorKind,
    /// Human-readable error message.
    pub message: String,
}

impl PluginError {
    pub fn new(kind: PluginErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Categories of plugin errors, matching ResolverError categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginErrorKind {
    /// Resolver has no usable configuration.
    NotConfigured,
    /// Login missing or rejected.
    Authentication,
    /// The service has no matching media.
    NotFound,
    /// Network/connectivity error.
    Network,
    /// Request line could not be parsed.
    InvalidRequest,
}

impl From<ResolverError> for PluginError {
    fn from(err: ResolverError) -> Self {
        let kind = match &err {
            ResolverError::ConfigurationMissing => PluginErrorKind::NotConfigured,
            ResolverError::NotAuthenticated | ResolverError::AuthenticationFailed { .. } => {
                PluginErrorKind::Authentication
            }
            ResolverError::LookupFailed { .. } => PluginErrorKind::NotFound,
            ResolverError::Communication { .. } => PluginErrorKind::Network,
        };
        Self::new(kind, err.to_string())
    }
}
