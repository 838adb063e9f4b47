//! Config-sourcer component adapter.
//!
//! Config sourcers resolve dynamic configuration values from external
//! systems. The read operation returns resolved values; the stop operation
//! tears down any background watchers and has no message result.

use std::sync::Arc;

use gantry_funcspec::FuncDef;

use crate::args::Logger;
use crate::component::{ComponentKind, ConfigSourcer};
use crate::error::PluginError;
use crate::wire::Connection;

use super::{Capabilities, ComponentClient, ComponentServer};

/// Server-side registration of a config-sourcer implementation.
pub struct ConfigSourcerPlugin {
    implementation: Arc<dyn ConfigSourcer>,
    capabilities: Capabilities,
    mappers: Vec<FuncDef>,
    logger: Logger,
}

impl ConfigSourcerPlugin {
    /// Wraps a config-sourcer implementation.
    #[must_use]
    pub fn new(implementation: Arc<dyn ConfigSourcer>) -> Self {
        Self {
            implementation,
            capabilities: Capabilities::new(),
            mappers: Vec::new(),
            logger: Logger::new("config_sourcer"),
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
        let read_impl = Arc::clone(&self.implementation);
        let stop_impl = self.implementation;
        ComponentServer::new(ComponentKind::ConfigSourcer, self.logger)
            .with_op("read", move || read_impl.read_func())
            .with_result_less_op("stop", move || stop_impl.stop_func())
            .with_capabilities(self.capabilities)
            .with_mappers(self.mappers)
    }
}

/// Host-side stub for a config-sourcer plugin.
#[derive(Debug)]
pub struct ConfigSourcerClient {
    client: ComponentClient,
}

impl ConfigSourcerClient {
    /// Creates the stub over a connection.
    #[must_use]
    pub fn new(conn: Arc<Connection>) -> Self {
        Self {
            client: ComponentClient::new(conn, ComponentKind::ConfigSourcer),
        }
    }

    /// Returns the callable read operation.
    ///
    /// # Errors
    ///
    /// Spec-fetch failures.
    pub fn read_func(&self) -> Result<FuncDef, PluginError> {
        self.client.op_func("read")
    }

    /// Returns the callable stop operation.
    ///
    /// # Errors
    ///
    /// Spec-fetch failures.
    pub fn stop_func(&self) -> Result<FuncDef, PluginError> {
        self.client.op_func("stop")
    }

    /// Access to the shared component surface.
    #[must_use]
    pub fn component(&self) -> &ComponentClient {
        &self.client
    }
}
