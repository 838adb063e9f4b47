//! Platform component adapter.
//!
//! Platforms carry the widest capability surface: destruction, exec, logs,
//! status, generation, and an optional default releaser used when no
//! release manager is configured.

use std::sync::Arc;

use gantry_funcspec::FuncDef;

use crate::args::Logger;
use crate::component::{ComponentKind, Platform};
use crate::error::PluginError;
use crate::wire::Connection;

use super::{Capabilities, ComponentClient, ComponentServer};

/// Server-side registration of a platform implementation.
pub struct PlatformPlugin {
    implementation: Arc<dyn Platform>,
    capabilities: Capabilities,
    mappers: Vec<FuncDef>,
    logger: Logger,
}

impl PlatformPlugin {
    /// Wraps a platform implementation.
    #[must_use]
    pub fn new(implementation: Arc<dyn Platform>) -> Self {
        Self {
            implementation,
            capabilities: Capabilities::new(),
            mappers: Vec::new(),
            logger: Logger::new("platform"),
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
        ComponentServer::new(ComponentKind::Platform, self.logger)
            .with_op("deploy", move || implementation.deploy_func())
            .with_capabilities(self.capabilities)
            .with_mappers(self.mappers)
    }
}

/// Host-side stub for a platform plugin.
#[derive(Debug)]
pub struct PlatformClient {
    client: ComponentClient,
}

impl PlatformClient {
    /// Creates the stub over a connection.
    #[must_use]
    pub fn new(conn: Arc<Connection>) -> Self {
        Self {
            client: ComponentClient::new(conn, ComponentKind::Platform),
        }
    }

    /// Returns the callable deploy operation.
    ///
    /// # Errors
    ///
    /// Spec-fetch failures.
    pub fn deploy_func(&self) -> Result<FuncDef, PluginError> {
        self.client.op_func("deploy")
    }

    /// Returns the callable default-releaser operation when the plugin
    /// advertises one.
    ///
    /// # Errors
    ///
    /// Probe or spec-fetch failures.
    pub fn default_releaser_func(&self) -> Result<Option<FuncDef>, PluginError> {
        if !self.client.has_capability("default_releaser")? {
            return Ok(None);
        }
        self.client.op_func("default_releaser").map(Some)
    }

    /// Access to the shared component surface.
    #[must_use]
    pub fn component(&self) -> &ComponentClient {
        &self.client
    }
}
