//! The mapper service: a plugin's user-defined converters, exposed to the
//! host so other plugins can use them.
//!
//! `list_mappers` advertises each converter as a funcspec; converters whose
//! spec cannot be derived are logged and skipped rather than failing the
//! listing. `map` executes one conversion to a requested result type by
//! routing the supplied arguments through an identity sink, which makes the
//! solver apply whatever converter chain reaches the target type.

use std::any::TypeId;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use gantry_funcspec::{
    call_dynamic, derive_spec, ArgClass, CallArgs, FuncDef, ParamSpec, SpecCall, SpecOptions,
    ValueKey, ValueSet,
};
use gantry_proto::{registry as type_registry, Envelope, FuncArgs, FuncSpec};

use crate::args::CancelToken;
use crate::error::PluginError;
use crate::wire::{CallContext, Connection, Service};

/// Tracing target for mapper-service activity.
const MAPPER_TARGET: &str = "gantry_plugin::mapper";

/// Wire name of the mapper service.
pub const MAPPER_SERVICE: &str = "mapper";

/// Response body of `list_mappers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMappersResponse {
    /// One funcspec per advertisable converter.
    pub funcs: Vec<FuncSpec>,
}

/// Request body of `map`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRequest {
    /// Argument values for the conversion.
    pub args: FuncArgs,
    /// Type URL of the desired result.
    pub result: String,
}

/// Response body of `map`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapResponse {
    /// The converted value.
    pub result: Envelope,
}

/// Serves a plugin's converters to the host.
pub struct MapperService {
    mappers: Vec<FuncDef>,
}

impl MapperService {
    /// Creates the service over the plugin's converters.
    #[must_use]
    pub fn new(mappers: Vec<FuncDef>) -> Self {
        Self { mappers }
    }

    /// Registers this service on a connection.
    pub fn serve_on(self, conn: &Connection) {
        conn.register_service(MAPPER_SERVICE, Arc::new(self));
    }

    fn list(&self) -> ListMappersResponse {
        let mut funcs = Vec::new();
        for mapper in &self.mappers {
            let opts = SpecOptions::new().with_converters(self.mappers.clone());
            match derive_spec(mapper, &opts) {
                Ok(spec) => funcs.push(spec),
                Err(err) => {
                    warn!(
                        target: MAPPER_TARGET,
                        mapper = mapper.name(),
                        error = %err,
                        "converter not advertisable, skipping"
                    );
                }
            }
        }
        ListMappersResponse { funcs }
    }

    fn map(&self, request: &MapRequest, ctx: &CallContext) -> Result<MapResponse, PluginError> {
        let type_id = type_registry::type_id_for_url(&request.result).ok_or_else(|| {
            PluginError::Remote {
                code: crate::wire::ErrorCode::FailedPrecondition,
                message: format!("output type is not known: {}", request.result),
            }
        })?;
        let sink = identity_sink(type_id, &request.result);

        let ambient = ValueSet::new().with(ctx.cancel.clone());
        let outputs = call_dynamic(&sink, &request.args, ambient, &self.mappers)?;
        let value = outputs
            .first()
            .ok_or_else(|| PluginError::InvalidBody {
                method: String::from("map"),
                message: String::from("conversion produced no value"),
            })?;
        let result = type_registry::encode_dyn(value.value().as_ref())?;
        Ok(MapResponse { result })
    }
}

/// Builds a function that takes the target type as input and returns it
/// unchanged, so the solver has to produce it.
fn identity_sink(type_id: TypeId, type_url: &str) -> FuncDef {
    let type_name = type_registry::type_name_for_url(type_url).unwrap_or("<registered message>");
    let key = ValueKey::from_parts(type_id, type_name, None, Some(type_url.to_owned()));
    let out_key = key.clone();
    FuncDef::raw(
        format!("identity/{type_url}"),
        vec![ParamSpec::new(key.clone(), ArgClass::Message)],
        vec![ParamSpec::new(out_key.clone(), ArgClass::Message)],
        move |set| {
            let value = set.get(&key).ok_or_else(|| {
                gantry_funcspec::FuncError::Unsatisfied {
                    slot: key.to_string(),
                }
            })?;
            Ok(vec![gantry_funcspec::TypedValue::from_erased(
                out_key.clone(),
                value.value_arc(),
            )])
        },
    )
}

impl Service for MapperService {
    fn handle(
        &self,
        method: &str,
        body: serde_json::Value,
        ctx: &CallContext,
    ) -> Result<serde_json::Value, PluginError> {
        match method {
            "list_mappers" => {
                serde_json::to_value(self.list()).map_err(|err| PluginError::Serialization {
                    message: err.to_string(),
                })
            }
            "map" => {
                let request: MapRequest =
                    serde_json::from_value(body).map_err(|err| PluginError::InvalidBody {
                        method: method.to_owned(),
                        message: err.to_string(),
                    })?;
                let response = self.map(&request, ctx)?;
                serde_json::to_value(response).map_err(|err| PluginError::Serialization {
                    message: err.to_string(),
                })
            }
            other => Err(PluginError::Unimplemented {
                message: format!("mapper service has no method '{other}'"),
            }),
        }
    }
}

/// Host-side client for a plugin's mapper service.
#[derive(Debug)]
pub struct MapperClient {
    conn: Arc<Connection>,
}

impl MapperClient {
    /// Creates the client over a connection.
    #[must_use]
    pub fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }

    /// Fetches the plugin's converters as callable functions.
    ///
    /// Each returned function round-trips through the plugin's `map` call,
    /// so the host can chain plugin-supplied conversions without knowing
    /// the payload types.
    ///
    /// # Errors
    ///
    /// Connection failures or a malformed listing.
    pub fn mappers(&self) -> Result<Vec<FuncDef>, PluginError> {
        let body = self.conn.call(
            MAPPER_SERVICE,
            "list_mappers",
            serde_json::json!({}),
            &CancelToken::new(),
        )?;
        let listing: ListMappersResponse =
            serde_json::from_value(body).map_err(|err| PluginError::Serialization {
                message: err.to_string(),
            })?;

        let mut funcs = Vec::with_capacity(listing.funcs.len());
        for spec in listing.funcs {
            let Some(result) = spec.result.first().cloned() else {
                continue;
            };
            let gantry_proto::ArgKind::Message { type_url } = result.kind else {
                continue;
            };
            let conn = Arc::clone(&self.conn);
            let receiver = FuncDef::from_fn(
                format!("mapper/{}", spec.name),
                move |cancel: CancelToken, args: CallArgs| -> Result<Envelope, PluginError> {
                    let body = serde_json::to_value(MapRequest {
                        args: FuncArgs { args: args.0 },
                        result: type_url.clone(),
                    })
                    .map_err(|err| PluginError::Serialization {
                        message: err.to_string(),
                    })?;
                    let response = conn.call(MAPPER_SERVICE, "map", body, &cancel)?;
                    let response: MapResponse =
                        serde_json::from_value(response).map_err(|err| {
                            PluginError::Serialization {
                                message: err.to_string(),
                            }
                        })?;
                    Ok(response.result)
                },
            );
            funcs.push(SpecCall::new(spec, receiver).into_func());
        }
        Ok(funcs)
    }
}
