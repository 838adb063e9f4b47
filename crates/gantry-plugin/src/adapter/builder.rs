//! Builder component adapter.

use std::sync::Arc;

use gantry_funcspec::FuncDef;

use crate::args::Logger;
use crate::component::{Builder, ComponentKind};
use crate::error::PluginError;
use crate::wire::Connection;

use super::{Capabilities, ComponentClient, ComponentServer};

/// Server-side registration of a builder implementation.
pub struct BuilderPlugin {
    implementation: Arc<dyn Builder>,
    capabilities: Capabilities,
    mappers: Vec<FuncDef>,
    logger: Logger,
}

impl BuilderPlugin {
    /// Wraps a builder implementation.
    #[must_use]
    pub fn new(implementation: Arc<dyn Builder>) -> Self {
        Self {
            implementation,
            capabilities: Capabilities::new(),
            mappers: Vec::new(),
            logger: Logger::new("builder"),
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
        ComponentServer::new(ComponentKind::Builder, self.logger)
            .with_op("build", move || implementation.build_func())
            .with_capabilities(self.capabilities)
            .with_mappers(self.mappers)
    }
}

/// Host-side stub for a builder plugin.
#[derive(Debug)]
pub struct BuilderClient {
    client: ComponentClient,
}

impl BuilderClient {
    /// Creates the stub over a connection.
    #[must_use]
    pub fn new(conn: Arc<Connection>) -> Self {
        Self {
            client: ComponentClient::new(conn, ComponentKind::Builder),
        }
    }

    /// Returns the callable build operation.
    ///
    /// # Errors
    ///
    /// Spec-fetch failures.
    pub fn build_func(&self) -> Result<FuncDef, PluginError> {
        self.client.op_func("build")
    }

    /// Access to the shared component surface (configure, documentation,
    /// capability probes).
    #[must_use]
    pub fn component(&self) -> &ComponentClient {
        &self.client
    }
}
