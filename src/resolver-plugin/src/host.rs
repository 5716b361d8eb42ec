//! In-process host state for a resolver driven over the plugin protocol.

use resolver_core::models::Credentials;
use resolver_core::resolver::{Capability, ResolverHost};
use std::sync::{PoisonError, RwLock};

/// Holds the configuration the remote host sent last and records the
/// capability the resolver reported back.
#[derive(Debug, Default)]
pub struct PluginHost {
    config: RwLock<Credentials>,
    capability: RwLock<Option<Capability>>,
}

impl PluginHost {
    pub fn new(config: Credentials) -> Self {
        Self {
            config: RwLock::new(config),
            capability: RwLock::new(None),
        }
    }

    pub fn set_config(&self, config: Credentials) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Last capability reported by the resolver, if any.
    pub fn capability(&self) -> Option<Capability> {
        *self
            .capability
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResolverHost for PluginHost {
    fn user_config(&self) -> Credentials {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn report_capabilities(&self, capability: Capability) {
        tracing::info!(?capability, "resolver reported capability");
        *self
            .capability
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(capability);
    }
}
