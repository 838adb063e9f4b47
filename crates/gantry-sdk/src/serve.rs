//! Plugin serving entry points.

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use gantry_funcspec::FuncDef;
use gantry_plugin::mapper::MapperService;
use gantry_plugin::{ComponentServer, Connection, JsonlTransport, PluginError, Transport};
use gantry_proto::handshake::{parse_reattach_map, REATTACH_ENV_VAR};

/// Tracing target for the serve lifecycle.
const SERVE_TARGET: &str = "gantry_sdk::serve";

/// Everything a plugin's `main` declares before serving.
pub struct ServeConfig {
    name: String,
    servers: Vec<ComponentServer>,
    mappers: Vec<FuncDef>,
    log_filter: Option<String>,
}

impl ServeConfig {
    /// Creates a config for the named plugin.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            servers: Vec::new(),
            mappers: Vec::new(),
            log_filter: None,
        }
    }

    /// Adds a component server (one per component kind the plugin
    /// implements).
    #[must_use]
    pub fn with_server(mut self, server: ComponentServer) -> Self {
        self.servers.push(server);
        self
    }

    /// Registers the plugin's converters, advertised through the mapper
    /// service.
    #[must_use]
    pub fn with_mappers(mut self, mappers: Vec<FuncDef>) -> Self {
        self.mappers = mappers;
        self
    }

    /// Overrides the tracing filter used when no `RUST_LOG` is set.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }
}

/// A running plugin connection.
pub struct ServeHandle {
    conn: Arc<Connection>,
    pump: JoinHandle<()>,
}

impl ServeHandle {
    /// Returns the underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Blocks until the host disconnects.
    pub fn wait(self) {
        drop(self.pump.join());
    }

    /// Shuts the connection down.
    pub fn shutdown(&self) {
        self.conn.close();
    }
}

/// Serves a plugin over the given transport.
///
/// Performs the handshake, registers every component server plus the
/// mapper service, and starts the frame pump.
///
/// # Errors
///
/// Returns [`PluginError::Handshake`] on a protocol or cookie mismatch,
/// or transport failures.
pub fn serve(config: ServeConfig, transport: Arc<dyn Transport>) -> Result<ServeHandle, PluginError> {
    init_tracing(config.log_filter.as_deref());

    let conn = Connection::new(transport);
    conn.handshake()?;

    info!(
        target: SERVE_TARGET,
        plugin = %config.name,
        components = config.servers.len(),
        mappers = config.mappers.len(),
        "plugin serving"
    );

    for server in config.servers {
        debug!(target: SERVE_TARGET, kind = %server.kind(), "registering component server");
        server.serve_on(&conn);
    }
    MapperService::new(config.mappers).serve_on(&conn);

    let pump = conn.start();
    Ok(ServeHandle { conn, pump })
}

/// Serves a plugin over this process's stdio, the out-of-process default.
///
/// Blocks until the host disconnects.
///
/// # Errors
///
/// Same failure modes as [`serve`].
pub fn serve_stdio(config: ServeConfig) -> Result<(), PluginError> {
    let transport = Arc::new(JsonlTransport::new(
        std::io::BufReader::new(std::io::stdin()),
        std::io::stdout(),
    ));
    serve(config, transport)?.wait();
    Ok(())
}

fn init_tracing(filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or("info")));
    // A host-side subscriber may already be installed; that is fine.
    drop(
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    );
}

/// Looks up the debug-reattach address for a plugin on the host side.
///
/// Reads the reattach environment variable, a JSON map of plugin name to
/// address written when plugins run in debug mode.
///
/// # Errors
///
/// Returns [`PluginError::Serialization`] when the variable is set but not
/// valid JSON.
pub fn reattach_address(plugin_name: &str) -> Result<Option<String>, PluginError> {
    let Ok(raw) = std::env::var(REATTACH_ENV_VAR) else {
        return Ok(None);
    };
    let map = parse_reattach_map(&raw).map_err(|err| PluginError::Serialization {
        message: format!("invalid {REATTACH_ENV_VAR}: {err}"),
    })?;
    Ok(map.get(plugin_name).cloned())
}

#[cfg(test)]
mod tests;
