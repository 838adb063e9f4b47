//! Release-manager component adapter.

use std::sync::Arc;

use gantry_funcspec::FuncDef;

use crate::args::Logger;
use crate::component::{ComponentKind, ReleaseManager};
use crate::error::PluginError;
use crate::wire::Connection;

use super::{Capabilities, ComponentClient, ComponentServer};

/// Server-side registration of a release-manager implementation.
pub struct ReleaseManagerPlugin {
    implementation: Arc<dyn ReleaseManager>,
    capabilities: Capabilities,
    mappers: Vec<FuncDef>,
    logger: Logger,
}

impl ReleaseManagerPlugin {
    /// Wraps a release-manager implementation.
    #[must_use]
    pub fn new(implementation: Arc<dyn ReleaseManager>) -> Self {
        Self {
            implementation,
            capabilities: Capabilities::new(),
            mappers: Vec::new(),
            logger: Logger::new("release_manager"),
        }
    }

    /// Attaches the optional capabilities this plugin implements.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Attaches the plugin's converters.
    #[must_use]
    pub fn with_mappers(mut self, mappers: Vec<FuncDef>) -> Self {
        self.mappers = mappers;
        self
    }

    /// Attaches a named logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Builds the wire-facing server adapter.
    #[must_use]
    pub fn into_server(self) -> ComponentServer {
        let implementation = self.implementation;
        ComponentServer::new(ComponentKind::ReleaseManager, self.logger)
            .with_op("release", move || implementation.release_func())
            .with_capabilities(self.capabilities)
            .with_mappers(self.mappers)
    }
}

/// Host-side stub for a release-manager plugin.
#[derive(Debug)]
pub struct ReleaseManagerClient {
    client: ComponentClient,
}

impl ReleaseManagerClient {
    /// Creates the stub over a connection.
    #[must_use]
    pub fn new(conn: Arc<Connection>) -> Self {
        Self {
            client: ComponentClient::new(conn, ComponentKind::ReleaseManager),
        }
    }

    /// Returns the callable release operation.
    ///
    /// # Errors
    ///
    /// Spec-fetch failures.
    pub fn release_func(&self) -> Result<FuncDef, PluginError> {
        self.client.op_func("release")
    }

    /// Access to the shared component surface.
    #[must_use]
    pub fn component(&self) -> &ComponentClient {
        &self.client
    }
}
