//! External plugin support for resolvers.
//!
//! This crate provides:
//! - A JSON-based protocol a host uses to drive a resolver in another process
//! - [`PluginServer`], which answers that protocol for any [`Resolver`]
//! - [`PluginHost`], the in-process [`ResolverHost`] fed by protocol requests
//!
//! # Plugin Protocol
//!
//! The host talks to the plugin via JSON messages over stdin/stdout:
//! - The host sends [`PluginRequest`] messages (one per line) to the plugin's stdin
//! - The plugin responds with [`PluginResponse`] messages (one per line) on stdout
//!
//! Logs must therefore never go to stdout.
//!
//! ```text
//! > {"id":1,"method":{"type":"Init","params":{"config":{"email":"a@b.c","password":"pw","quality":1}}}}
//! < {"id":1,"result":{"status":"Capability","capability":"UrlLookup"}}
//! > {"id":2,"method":{"type":"Search","params":{"query":"daft punk"}}}
//! < {"id":2,"result":{"status":"Tracks","tracks":[...]}}
//! ```
//!
//! [`Resolver`]: resolver_core::resolver::Resolver
//! [`ResolverHost`]: resolver_core::resolver::ResolverHost

mod host;
pub mod protocol;
mod server;

pub use host::PluginHost;
pub use protocol::{
    PluginError, PluginErrorKind, PluginInfo, PluginMethod, PluginRequest, PluginResponse,
    PluginResult, PROTOCOL_VERSION,
};
pub use server::{PluginServer, PluginServerError};
