use std::sync::Arc;

use crate::config::Settings;
use crate::engine::{Engine, NetworkConfig, Provider};

/// Read-only state handed to every RPC handler.
#[derive(Clone)]
pub struct ServerContext {
    pub settings: Arc<Settings>,
    pub network: &'static NetworkConfig,
    pub engine: Arc<dyn Engine>,
    pub provider: Arc<dyn Provider>,
}

impl ServerContext {
    pub fn new(
        settings: Arc<Settings>,
        network: &'static NetworkConfig,
        engine: Arc<dyn Engine>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            settings,
            network,
            engine,
            provider,
        }
    }

    pub fn engine_id(&self) -> &str {
        &self.settings.engine
    }
}
