//! Component adapters: server side and client stub.
//!
//! Every component kind shares one RPC shape — `configure`,
//! `config_struct`, `documentation`, `<op>_spec` / `<op>` for each primary
//! operation, and an `is_<cap>` / `<cap>_spec` / `<cap>` triple per
//! optional capability. [`ComponentServer`] implements that shape
//! generically over a table of operations plus a [`Capabilities`] bundle;
//! the per-kind modules supply the tables. [`ComponentClient`] is the
//! host-side counterpart, with per-operation funcspec caching and
//! unimplemented-probes-as-absent semantics.

pub mod builder;
pub mod config_sourcer;
pub mod platform;
pub mod registry;
pub mod release_manager;
pub mod task;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use gantry_docs::Documentation;
use gantry_funcspec::{
    call_dynamic, derive_spec, derived_value, CallArgs, FuncDef, SpecCall, SpecOptions, ValueSet,
};
use gantry_proto::{
    registry as type_registry, DeclaredResource, DestroyedResource, Envelope, FuncArgs, FuncSpec,
};

use crate::args::{
    CancelToken, Cleanup, DeclaredCollector, DestroyedCollector, Internal, Logger,
};
use crate::component::{
    Authenticator, ComponentKind, Configurable, Destroyer, Documented, Execer, Generation,
    LogPlatform, PlatformReleaser, Status, WorkspaceDestroyer,
};
use crate::config::ConfigStruct;
use crate::error::PluginError;
use crate::template;
use crate::wire::{CallContext, Connection, Service};

/// Tracing target for adapter activity.
const ADAPTER_TARGET: &str = "gantry_plugin::adapter";

/// Optional capabilities a component implementation carries.
///
/// Registered explicitly: a plugin whose one struct implements several
/// capability traits passes the same `Arc` for each. The adapter probes
/// these and the host stub exposes exactly what is present.
#[derive(Clone, Default)]
pub struct Capabilities {
    /// Configuration decoding.
    pub configurable: Option<Arc<dyn Configurable>>,
    /// Self-documentation.
    pub documented: Option<Arc<dyn Documented>>,
    /// Credential acquisition and validation.
    pub authenticator: Option<Arc<dyn Authenticator>>,
    /// Resource cleanup.
    pub destroyer: Option<Arc<dyn Destroyer>>,
    /// Once-per-workspace cleanup.
    pub workspace_destroyer: Option<Arc<dyn WorkspaceDestroyer>>,
    /// Exec sessions into deployments.
    pub execer: Option<Arc<dyn Execer>>,
    /// Application log serving.
    pub log_platform: Option<Arc<dyn LogPlatform>>,
    /// Stable generation ids.
    pub generation: Option<Arc<dyn Generation>>,
    /// Resource health reporting.
    pub status: Option<Arc<dyn Status>>,
    /// Default release manager (platforms only).
    pub default_releaser: Option<Arc<dyn PlatformReleaser>>,
}

/// Capability methods: wire method name, owning probe name, and whether
/// the operation may produce no message result.
const CAPABILITY_METHODS: &[(&str, &str, bool)] = &[
    ("auth", "authenticator", false),
    ("validate_auth", "authenticator", true),
    ("destroy", "destroyer", true),
    ("destroy_workspace", "workspace_destroyer", true),
    ("exec", "execer", false),
    ("logs", "log_platform", true),
    ("generation", "generation", false),
    ("status", "status", false),
    ("default_releaser", "default_releaser", true),
];

impl Capabilities {
    /// Creates an empty capability bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the configuration capability.
    #[must_use]
    pub fn with_configurable(mut self, value: Arc<dyn Configurable>) -> Self {
        self.configurable = Some(value);
        self
    }

    /// Registers the documentation capability.
    #[must_use]
    pub fn with_documented(mut self, value: Arc<dyn Documented>) -> Self {
        self.documented = Some(value);
        self
    }

    /// Registers the authentication capability.
    #[must_use]
    pub fn with_authenticator(mut self, value: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(value);
        self
    }

    /// Registers the destroy capability.
    #[must_use]
    pub fn with_destroyer(mut self, value: Arc<dyn Destroyer>) -> Self {
        self.destroyer = Some(value);
        self
    }

    /// Registers the workspace-destroy capability.
    #[must_use]
    pub fn with_workspace_destroyer(mut self, value: Arc<dyn WorkspaceDestroyer>) -> Self {
        self.workspace_destroyer = Some(value);
        self
    }

    /// Registers the exec capability.
    #[must_use]
    pub fn with_execer(mut self, value: Arc<dyn Execer>) -> Self {
        self.execer = Some(value);
        self
    }

    /// Registers the log-platform capability.
    #[must_use]
    pub fn with_log_platform(mut self, value: Arc<dyn LogPlatform>) -> Self {
        self.log_platform = Some(value);
        self
    }

    /// Registers the generation capability.
    #[must_use]
    pub fn with_generation(mut self, value: Arc<dyn Generation>) -> Self {
        self.generation = Some(value);
        self
    }

    /// Registers the status capability.
    #[must_use]
    pub fn with_status(mut self, value: Arc<dyn Status>) -> Self {
        self.status = Some(value);
        self
    }

    /// Registers the default-releaser capability.
    #[must_use]
    pub fn with_default_releaser(mut self, value: Arc<dyn PlatformReleaser>) -> Self {
        self.default_releaser = Some(value);
        self
    }

    /// Answers an `is_<cap>` probe; `None` for unknown probe names.
    fn probe(&self, cap: &str) -> Option<bool> {
        Some(match cap {
            "configurable" => self.configurable.is_some(),
            "documented" => self.documented.is_some(),
            "authenticator" => self.authenticator.is_some(),
            "destroyer" => self.destroyer.is_some(),
            "workspace_destroyer" => self.workspace_destroyer.is_some(),
            "execer" => self.execer.is_some(),
            "log_platform" => self.log_platform.is_some(),
            "generation" => self.generation.is_some(),
            "status" => self.status.is_some(),
            "default_releaser" => self.default_releaser.is_some(),
            _ => return None,
        })
    }

    /// Returns the function behind a capability method, when the
    /// capability is present.
    fn func(&self, method: &str) -> Option<FuncDef> {
        match method {
            "auth" => self.authenticator.as_ref().map(|a| a.auth_func()),
            "validate_auth" => self.authenticator.as_ref().map(|a| a.validate_auth_func()),
            "destroy" => self.destroyer.as_ref().map(|d| d.destroy_func()),
            "destroy_workspace" => self
                .workspace_destroyer
                .as_ref()
                .map(|d| d.destroy_workspace_func()),
            "exec" => self.execer.as_ref().map(|e| e.exec_func()),
            "logs" => self.log_platform.as_ref().map(|l| l.logs_func()),
            "generation" => self.generation.as_ref().map(|g| g.generation_func()),
            "status" => self.status.as_ref().map(|s| s.status_func()),
            "default_releaser" => self
                .default_releaser
                .as_ref()
                .map(|r| r.default_releaser_func()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present: Vec<&str> = CAPABILITY_METHODS
            .iter()
            .map(|(_, cap, _)| *cap)
            .filter(|cap| self.probe(cap) == Some(true))
            .collect();
        f.debug_struct("Capabilities").field("present", &present).finish()
    }
}

/// The result envelope of one component operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpResponse {
    /// The operation's message result, absent for result-less operations.
    pub result: Option<Envelope>,
    /// Forward-compatible JSON projection of the result.
    #[serde(default)]
    pub result_json: String,
    /// Values for the host's templating engine.
    #[serde(default)]
    pub template_data: BTreeMap<String, serde_json::Value>,
    /// Labels attached to the result.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Resources the operation declared.
    #[serde(default)]
    pub declared_resources: Vec<DeclaredResource>,
    /// Resources the operation destroyed.
    #[serde(default)]
    pub destroyed_resources: Vec<DestroyedResource>,
}

/// Host-side wrapper for an operation response, injected into spec-driven
/// call results.
#[derive(Clone, Debug)]
pub struct OpResult(pub OpResponse);

derived_value!(OpResult);

/// Request body for the `configure` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureRequest {
    /// The decoded configuration as JSON.
    pub config: serde_json::Value,
}

type OpProvider = Box<dyn Fn() -> FuncDef + Send + Sync>;

struct OpDef {
    name: &'static str,
    provider: OpProvider,
    allow_empty_result: bool,
}

/// Generic server adapter for one component kind.
///
/// Built by the per-kind constructors ([`builder::BuilderPlugin`] and
/// friends), then registered on a connection under the kind's service
/// name.
pub struct ComponentServer {
    kind: ComponentKind,
    ops: Vec<OpDef>,
    capabilities: Capabilities,
    mappers: Vec<FuncDef>,
    logger: Logger,
}

impl ComponentServer {
    /// Creates a server for a component kind. The standard converters
    /// (terminal UI, log writer) are always present.
    #[must_use]
    pub fn new(kind: ComponentKind, logger: Logger) -> Self {
        Self {
            kind,
            ops: Vec::new(),
            capabilities: Capabilities::new(),
            mappers: crate::mappers::standard_mappers(),
            logger,
        }
    }

    /// Registers a primary operation.
    #[must_use]
    pub fn with_op(
        mut self,
        name: &'static str,
        provider: impl Fn() -> FuncDef + Send + Sync + 'static,
    ) -> Self {
        self.ops.push(OpDef {
            name,
            provider: Box::new(provider),
            allow_empty_result: false,
        });
        self
    }

    /// Registers a primary operation that may produce no message result.
    #[must_use]
    pub fn with_result_less_op(
        mut self,
        name: &'static str,
        provider: impl Fn() -> FuncDef + Send + Sync + 'static,
    ) -> Self {
        self.ops.push(OpDef {
            name,
            provider: Box::new(provider),
            allow_empty_result: true,
        });
        self
    }

    /// Attaches the capability bundle.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Adds the plugin's own converters alongside the standard ones.
    #[must_use]
    pub fn with_mappers(mut self, mappers: Vec<FuncDef>) -> Self {
        self.mappers.extend(mappers);
        self
    }

    /// Returns the component kind.
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Registers this server on a connection under its service name.
    pub fn serve_on(self, conn: &Connection) {
        conn.register_service(self.kind.service_name(), Arc::new(self));
    }

    fn unimplemented(&self, what: &str) -> PluginError {
        PluginError::Unimplemented {
            message: format!("plugin does not implement: {what}"),
        }
    }

    fn resolve_func(&self, method: &str) -> Result<(FuncDef, bool), PluginError> {
        if let Some(op) = self.ops.iter().find(|op| op.name == method) {
            return Ok(((op.provider)(), op.allow_empty_result));
        }
        if let Some((_, cap, allow_empty)) = CAPABILITY_METHODS
            .iter()
            .find(|(name, _, _)| *name == method)
        {
            return match self.capabilities.func(method) {
                Some(func) => Ok((func, *allow_empty)),
                None => Err(self.unimplemented(cap)),
            };
        }
        Err(self.unimplemented(method))
    }

    fn spec_for(&self, method: &str) -> Result<FuncSpec, PluginError> {
        let (func, allow_empty) = self.resolve_func(method)?;
        let mut opts = SpecOptions::new().with_converters(self.mappers.clone());
        if allow_empty {
            opts = opts.allow_empty_result();
        }
        Ok(derive_spec(&func, &opts)?)
    }

    fn call_op(
        &self,
        method: &str,
        body: serde_json::Value,
        ctx: &CallContext,
    ) -> Result<serde_json::Value, PluginError> {
        let (func, allow_empty) = self.resolve_func(method)?;
        let args: FuncArgs =
            serde_json::from_value(body).map_err(|err| PluginError::InvalidBody {
                method: method.to_owned(),
                message: err.to_string(),
            })?;

        let cleanup = Cleanup::new();
        let declared = DeclaredCollector::default();
        let destroyed = DestroyedCollector::default();
        let ambient = ValueSet::new()
            .with(self.logger.named(method))
            .with(ctx.cancel.clone())
            .with(Internal {
                conn: Arc::clone(&ctx.conn),
                mappers: self.mappers.clone(),
                cleanup: cleanup.clone(),
            })
            .with(declared.clone())
            .with(destroyed.clone());

        debug!(
            target: ADAPTER_TARGET,
            kind = %self.kind,
            method,
            args = args.args.len(),
            "executing operation"
        );

        let outcome = call_dynamic(&func, &args, ambient, &self.mappers);
        cleanup.close();
        let outputs = outcome?;

        let mut response = OpResponse {
            declared_resources: std::mem::take(
                &mut declared.0.lock().expect("collector lock poisoned").declared,
            ),
            destroyed_resources: std::mem::take(
                &mut destroyed.0.lock().expect("collector lock poisoned").destroyed,
            ),
            ..OpResponse::default()
        };

        match outputs.first() {
            Some(value) => {
                let envelope = if let Some(env) = value.value().downcast_ref::<Envelope>() {
                    env.clone()
                } else {
                    type_registry::encode_dyn(value.value().as_ref())?
                };
                let result_json = type_registry::render_json_dyn(value.value().as_ref())
                    .unwrap_or_else(|_| String::from("null"));
                response.template_data =
                    template::template_data(value.value().as_ref(), &result_json);
                response.labels = type_registry::labels_dyn(value.value().as_ref());
                response.result = Some(envelope);
                response.result_json = result_json;
            }
            None if allow_empty => {}
            None => {
                return Err(PluginError::InvalidBody {
                    method: method.to_owned(),
                    message: String::from("operation produced no result"),
                })
            }
        }

        serde_json::to_value(&response).map_err(|err| PluginError::Serialization {
            message: err.to_string(),
        })
    }
}

impl Service for ComponentServer {
    fn handle(
        &self,
        method: &str,
        body: serde_json::Value,
        ctx: &CallContext,
    ) -> Result<serde_json::Value, PluginError> {
        if let Some(cap) = method.strip_prefix("is_") {
            let answer = self
                .capabilities
                .probe(cap)
                .ok_or_else(|| self.unimplemented(method))?;
            return Ok(json!(answer));
        }

        match method {
            "configure" => {
                let request: ConfigureRequest =
                    serde_json::from_value(body).map_err(|err| PluginError::InvalidBody {
                        method: method.to_owned(),
                        message: err.to_string(),
                    })?;
                let configurable = self
                    .capabilities
                    .configurable
                    .as_ref()
                    .ok_or_else(|| self.unimplemented("configurable"))?;
                let bytes = serde_json::to_vec(&request.config).map_err(|err| {
                    PluginError::Serialization {
                        message: err.to_string(),
                    }
                })?;
                configurable.configure(&bytes)?;
                Ok(json!({}))
            }
            "config_struct" => {
                let configurable = self
                    .capabilities
                    .configurable
                    .as_ref()
                    .ok_or_else(|| self.unimplemented("configurable"))?;
                serde_json::to_value(configurable.config_struct()).map_err(|err| {
                    PluginError::Serialization {
                        message: err.to_string(),
                    }
                })
            }
            "documentation" => {
                let documented = self
                    .capabilities
                    .documented
                    .as_ref()
                    .ok_or_else(|| self.unimplemented("documented"))?;
                serde_json::to_value(documented.documentation()?).map_err(|err| {
                    PluginError::Serialization {
                        message: err.to_string(),
                    }
                })
            }
            _ => {
                if let Some(op) = method.strip_suffix("_spec") {
                    let spec = self.spec_for(op)?;
                    return serde_json::to_value(spec).map_err(|err| {
                        PluginError::Serialization {
                            message: err.to_string(),
                        }
                    });
                }
                self.call_op(method, body, ctx)
            }
        }
    }
}

impl std::fmt::Debug for ComponentServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ops: Vec<&str> = self.ops.iter().map(|op| op.name).collect();
        f.debug_struct("ComponentServer")
            .field("kind", &self.kind)
            .field("ops", &ops)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Host-side stub for one component service.
///
/// Fetches each operation's funcspec lazily and caches it until
/// [`ComponentClient::invalidate_specs`]; probes answered with the wire
/// unimplemented code read as `false`.
pub struct ComponentClient {
    conn: Arc<Connection>,
    service: String,
    spec_cache: Mutex<HashMap<String, FuncSpec>>,
}

impl ComponentClient {
    /// Creates a stub for a component kind over a connection.
    #[must_use]
    pub fn new(conn: Arc<Connection>, kind: ComponentKind) -> Self {
        Self {
            conn,
            service: kind.service_name(),
            spec_cache: Mutex::new(HashMap::new()),
        }
    }

    fn call(
        &self,
        method: &str,
        body: serde_json::Value,
        cancel: &CancelToken,
    ) -> Result<serde_json::Value, PluginError> {
        self.conn.call(&self.service, method, body, cancel)
    }

    /// Sends decoded configuration to the plugin.
    ///
    /// # Errors
    ///
    /// The plugin's configure failure, or connection errors.
    pub fn configure(&self, config: &serde_json::Value) -> Result<(), PluginError> {
        self.call(
            "configure",
            serde_json::to_value(ConfigureRequest {
                config: config.clone(),
            })
            .map_err(|err| PluginError::Serialization {
                message: err.to_string(),
            })?,
            &CancelToken::new(),
        )?;
        Ok(())
    }

    /// Fetches the plugin's configuration shape.
    ///
    /// # Errors
    ///
    /// [`PluginError::Unimplemented`] when the plugin has no configuration,
    /// or connection errors.
    pub fn config_struct(&self) -> Result<ConfigStruct, PluginError> {
        let body = self.call("config_struct", json!({}), &CancelToken::new())?;
        serde_json::from_value(body).map_err(|err| PluginError::Serialization {
            message: err.to_string(),
        })
    }

    /// Fetches the plugin's documentation bundle.
    ///
    /// # Errors
    ///
    /// [`PluginError::Unimplemented`] when undocumented, or connection
    /// errors.
    pub fn documentation(&self) -> Result<Documentation, PluginError> {
        let body = self.call("documentation", json!({}), &CancelToken::new())?;
        serde_json::from_value(body).map_err(|err| PluginError::Serialization {
            message: err.to_string(),
        })
    }

    /// Probes for an optional capability. An unimplemented answer is
    /// `false`, not an error.
    ///
    /// # Errors
    ///
    /// Connection errors only.
    pub fn has_capability(&self, cap: &str) -> Result<bool, PluginError> {
        match self.call(&format!("is_{cap}"), json!({}), &CancelToken::new()) {
            Ok(body) => Ok(body.as_bool().unwrap_or(false)),
            Err(err) if err.is_unimplemented() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Fetches (and caches) the funcspec for an operation.
    ///
    /// # Errors
    ///
    /// [`PluginError::Unimplemented`] for absent operations, or connection
    /// errors.
    pub fn op_spec(&self, op: &str) -> Result<FuncSpec, PluginError> {
        if let Some(spec) = self
            .spec_cache
            .lock()
            .expect("spec cache lock poisoned")
            .get(op)
        {
            return Ok(spec.clone());
        }
        let body = self.call(&format!("{op}_spec"), json!({}), &CancelToken::new())?;
        let spec: FuncSpec =
            serde_json::from_value(body).map_err(|err| PluginError::Serialization {
                message: err.to_string(),
            })?;
        self.spec_cache
            .lock()
            .expect("spec cache lock poisoned")
            .insert(op.to_owned(), spec.clone());
        Ok(spec)
    }

    /// Drops all cached funcspecs; used when the plugin connection is
    /// re-established.
    pub fn invalidate_specs(&self) {
        self.spec_cache
            .lock()
            .expect("spec cache lock poisoned")
            .clear();
    }

    /// Builds the callable function for an operation.
    ///
    /// The returned function's advertised inputs mirror the plugin's spec;
    /// invoking it ships the collected arguments over the wire and yields
    /// an [`OpResult`]. The host must supply a [`CancelToken`] among the
    /// call values.
    ///
    /// # Errors
    ///
    /// Spec-fetch failures.
    pub fn op_func(&self, op: &str) -> Result<FuncDef, PluginError> {
        let mut spec = self.op_spec(op)?;
        // Operations are direct calls even when the plugin's function
        // could act as a mapper.
        spec.result.clear();

        let conn = Arc::clone(&self.conn);
        let service = self.service.clone();
        let method = op.to_owned();
        let receiver = FuncDef::from_fn(
            format!("{service}.{method}"),
            move |cancel: CancelToken, args: CallArgs| -> Result<OpResult, PluginError> {
                let body =
                    serde_json::to_value(FuncArgs { args: args.0 }).map_err(|err| {
                        PluginError::Serialization {
                            message: err.to_string(),
                        }
                    })?;
                let response = conn.call(&service, &method, body, &cancel)?;
                let response: OpResponse =
                    serde_json::from_value(response).map_err(|err| {
                        PluginError::Serialization {
                            message: err.to_string(),
                        }
                    })?;
                Ok(OpResult(response))
            },
        );

        Ok(SpecCall::new(spec, receiver).into_func())
    }
}

impl std::fmt::Debug for ComponentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentClient")
            .field("service", &self.service)
            .field(
                "cached_specs",
                &self.spec_cache.lock().expect("spec cache lock").len(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
