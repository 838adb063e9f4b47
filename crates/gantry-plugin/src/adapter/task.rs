//! Task-launcher component adapter.

use std::sync::Arc;

use gantry_funcspec::FuncDef;

use crate::args::Logger;
use crate::component::{ComponentKind, TaskLauncher};
use crate::error::PluginError;
use crate::wire::Connection;

use super::{Capabilities, ComponentClient, ComponentServer};

/// Server-side registration of a task-launcher implementation.
pub struct TaskLauncherPlugin {
    implementation: Arc<dyn TaskLauncher>,
    capabilities: Capabilities,
    mappers: Vec<FuncDef>,
    logger: Logger,
}

impl TaskLauncherPlugin {
    /// Wraps a task-launcher implementation.
    #[must_use]
    pub fn new(implementation: Arc<dyn TaskLauncher>) -> Self {
        Self {
            implementation,
            capabilities: Capabilities::new(),
            mappers: Vec::new(),
            logger: Logger::new("task_launcher"),
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
        let start_impl = Arc::clone(&self.implementation);
        let stop_impl = Arc::clone(&self.implementation);
        let watch_impl = self.implementation;
        ComponentServer::new(ComponentKind::TaskLauncher, self.logger)
            .with_op("start_task", move || start_impl.start_task_func())
            .with_result_less_op("stop_task", move || stop_impl.stop_task_func())
            .with_result_less_op("watch_task", move || watch_impl.watch_task_func())
            .with_capabilities(self.capabilities)
            .with_mappers(self.mappers)
    }
}

/// Host-side stub for a task-launcher plugin.
#[derive(Debug)]
pub struct TaskLauncherClient {
    client: ComponentClient,
}

impl TaskLauncherClient {
    /// Creates the stub over a connection.
    #[must_use]
    pub fn new(conn: Arc<Connection>) -> Self {
        Self {
            client: ComponentClient::new(conn, ComponentKind::TaskLauncher),
        }
    }

    /// Returns the callable start-task operation.
    ///
    /// # Errors
    ///
    /// Spec-fetch failures.
    pub fn start_task_func(&self) -> Result<FuncDef, PluginError> {
        self.client.op_func("start_task")
    }

    /// Returns the callable stop-task operation.
    ///
    /// # Errors
    ///
    /// Spec-fetch failures.
    pub fn stop_task_func(&self) -> Result<FuncDef, PluginError> {
        self.client.op_func("stop_task")
    }

    /// Returns the callable watch-task operation.
    ///
    /// # Errors
    ///
    /// Spec-fetch failures.
    pub fn watch_task_func(&self) -> Result<FuncDef, PluginError> {
        self.client.op_func("watch_task")
    }

    /// Access to the shared component surface.
    #[must_use]
    pub fn component(&self) -> &ComponentClient {
        &self.client
    }
}
