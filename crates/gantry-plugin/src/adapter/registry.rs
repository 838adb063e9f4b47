//! Artifact-registry component adapter.

use std::sync::Arc;

use gantry_funcspec::FuncDef;

use crate::args::Logger;
use crate::component::{ComponentKind, Registry};
use crate::error::PluginError;
use crate::wire::Connection;

use super::{Capabilities, ComponentClient, ComponentServer};

/// Server-side registration of an artifact-registry implementation.
pub struct RegistryPlugin {
    implementation: Arc<dyn Registry>,
    capabilities: Capabilities,
    mappers: Vec<FuncDef>,
    logger: Logger,
}

impl RegistryPlugin {
    /// Wraps a registry implementation.
    #[must_use]
    pub fn new(implementation: Arc<dyn Registry>) -> Self {
        Self {
            implementation,
            capabilities: Capabilities::new(),
            mappers: Vec::new(),
            logger: Logger::new("registry"),
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
        ComponentServer::new(ComponentKind::Registry, self.logger)
            .with_op("push", move || implementation.push_func())
            .with_capabilities(self.capabilities)
            .with_mappers(self.mappers)
    }
}

/// Host-side stub for an artifact-registry plugin.
#[derive(Debug)]
pub struct RegistryClient {
    client: ComponentClient,
}

impl RegistryClient {
    /// Creates the stub over a connection.
    #[must_use]
    pub fn new(conn: Arc<Connection>) -> Self {
        Self {
            client: ComponentClient::new(conn, ComponentKind::Registry),
        }
    }

    /// Returns the callable push operation.
    ///
    /// # Errors
    ///
    /// Spec-fetch failures.
    pub fn push_func(&self) -> Result<FuncDef, PluginError> {
        self.client.op_func("push")
    }

    /// Access to the shared component surface.
    #[must_use]
    pub fn component(&self) -> &ComponentClient {
        &self.client
    }
}
