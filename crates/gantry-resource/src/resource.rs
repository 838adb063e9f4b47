//! A single resource declaration with its lifecycle callbacks and state.

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use gantry_funcspec::{
    ArgClass, FuncDef, FuncError, FuncOutput, IntoFunc, ParamSpec, TypedValue, ValueKey, ValueSet,
};
use gantry_proto::registry::ErasedValue;
use gantry_proto::{
    DeclaredResource, DestroyedResource, Envelope, EnvelopeError, Message, ResourceCategory,
    ResourceState, StatusResource,
};

use crate::error::ResourceError;

/// Unique per-resource marker flowing through the solver.
///
/// The solver only invokes a function when something depends on one of its
/// outputs. Every lifecycle wrapper outputs a `Marker` subtyped with its
/// resource name, and the manager's sink depends on all of them, which
/// forces every wrapper into the plan exactly once.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Marker;

pub(crate) fn marker_key(name: &str) -> ValueKey {
    ValueKey::typed::<Marker>().with_subtype(name)
}

pub(crate) fn marker_value(name: &str) -> TypedValue {
    TypedValue::with_key(marker_key(name), Marker)
}

/// Monotonic clock stamping manual state writes, so destruction can infer
/// an ordering when no recorded creation order exists.
static SET_STATE_CLOCK: AtomicU32 = AtomicU32::new(0);

/// Container for the status reports one resource contributes.
///
/// A single resource may track several platform objects (a deployment
/// resource reporting one entry per pod), so the response holds zero or
/// more individual reports.
#[derive(Clone, Debug, Default)]
pub struct StatusResponse {
    /// Individual platform-object reports.
    pub resources: Vec<StatusResource>,
}

impl FuncOutput for StatusResponse {
    fn output_params() -> Vec<ParamSpec> {
        vec![ParamSpec::derived::<StatusResponse>()]
    }

    fn into_values(self) -> Vec<TypedValue> {
        vec![TypedValue::of(self)]
    }
}

/// Monomorphised state hooks captured when the state type is declared.
#[derive(Clone, Copy)]
struct StateCodec {
    type_url: &'static str,
    key: fn() -> ValueKey,
    encode: fn(&(dyn Any + Send + Sync)) -> Result<Envelope, EnvelopeError>,
    render_json: fn(&(dyn Any + Send + Sync)) -> Result<String, EnvelopeError>,
    decode: fn(&Envelope) -> Result<ErasedValue, EnvelopeError>,
    empty: fn() -> ErasedValue,
}

impl StateCodec {
    fn of<S: Message + Default>() -> Self {
        Self {
            type_url: S::TYPE_URL,
            key: || ValueKey::typed::<S>().with_subtype(S::TYPE_URL),
            encode: |value| {
                let state = value
                    .downcast_ref::<S>()
                    .ok_or(EnvelopeError::ErasedTypeMismatch {
                        type_url: S::TYPE_URL.to_owned(),
                        expected: std::any::type_name::<S>(),
                    })?;
                Envelope::encode(state)
            },
            render_json: |value| {
                let state = value
                    .downcast_ref::<S>()
                    .ok_or(EnvelopeError::ErasedTypeMismatch {
                        type_url: S::TYPE_URL.to_owned(),
                        expected: std::any::type_name::<S>(),
                    })?;
                serde_json::to_string(state).map_err(|source| EnvelopeError::EncodeFailed {
                    type_url: S::TYPE_URL.to_owned(),
                    source,
                })
            },
            decode: |envelope| envelope.decode::<S>().map(|s| Arc::new(s) as ErasedValue),
            empty: || Arc::new(S::default()) as ErasedValue,
        }
    }
}

/// A named resource with an associated lifecycle and optional state.
///
/// Built with chained `with_*` methods; [`Resource::validate`] checks the
/// declaration before any operation runs.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use gantry_resource::Resource;
/// use gantry_proto::Message;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
/// struct LbState {
///     address: String,
/// }
///
/// impl Message for LbState {
///     const TYPE_URL: &'static str = "example.LbState";
/// }
///
/// let resource = Resource::new("load balancer")
///     .with_type("alb")
///     .with_platform("aws")
///     .with_state::<LbState>()
///     .with_create(|| -> Result<LbState, std::io::Error> {
///         Ok(LbState { address: "10.0.0.1".into() })
///     })
///     .with_destroy(|_state: Arc<LbState>| {});
///
/// resource.validate().expect("valid declaration");
/// ```
pub struct Resource {
    name: String,
    resource_type: String,
    platform: String,
    category: ResourceCategory,
    codec: Option<StateCodec>,
    state: Arc<Mutex<Option<ErasedValue>>>,
    state_clock: Arc<AtomicU32>,
    create: Option<FuncDef>,
    destroy: Option<FuncDef>,
    status: Option<FuncDef>,
    status_resp: Arc<Mutex<Option<StatusResponse>>>,
}

impl Resource {
    /// Creates a resource declaration with the given name.
    ///
    /// The name is user-facing output, so keep it descriptive but short:
    /// "security group", "app container". It must be unique within one
    /// manager.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: String::new(),
            platform: String::new(),
            category: ResourceCategory::Other,
            codec: None,
            state: Arc::new(Mutex::new(None)),
            state_clock: Arc::new(AtomicU32::new(0)),
            create: None,
            destroy: None,
            status: None,
            status_resp: Arc::new(Mutex::new(None)),
        }
    }

    /// Sets the platform-specific type string ("container", "pod",
    /// "autoscaling group"). Defaults to the resource name.
    #[must_use]
    pub fn with_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    /// Sets the platform this resource is created on ("kubernetes",
    /// "docker").
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Sets the display category hint.
    #[must_use]
    pub fn with_category(mut self, category: ResourceCategory) -> Self {
        self.category = category;
        self
    }

    /// Declares the state type for this resource.
    ///
    /// The create callback must return this type; its value is persisted
    /// with the manager state and handed to the destroy and status
    /// callbacks as `Arc<S>`. Other resources depending on `Arc<S>` in
    /// their create callbacks acquire a creation-order dependency on this
    /// resource.
    #[must_use]
    pub fn with_state<S: Message + Default>(mut self) -> Self {
        self.codec = Some(StateCodec::of::<S>());
        self
    }

    /// Sets the creation callback.
    ///
    /// The callback may take any injectable values as parameters and, when
    /// a state type is declared, must return it (`Result<S, E>`). The
    /// callback runs for every operation, so creation of shared
    /// infrastructure should be idempotent.
    #[must_use]
    pub fn with_create<F, M>(mut self, f: F) -> Self
    where
        F: IntoFunc<M>,
    {
        self.create = Some(FuncDef::from_fn(format!("create/{}", self.name), f));
        self
    }

    /// Sets the destruction callback. Optional: resources without one are
    /// reported as declared rather than destroyed, but still participate in
    /// destruction ordering.
    #[must_use]
    pub fn with_destroy<F, M>(mut self, f: F) -> Self
    where
        F: IntoFunc<M>,
    {
        self.destroy = Some(FuncDef::from_fn(format!("destroy/{}", self.name), f));
        self
    }

    /// Sets the status callback, which reports the health of the platform
    /// objects this resource tracks.
    #[must_use]
    pub fn with_status<F, M>(mut self, f: F) -> Self
    where
        F: IntoFunc<M>,
    {
        self.status = Some(FuncDef::from_fn(format!("status/{}", self.name), f));
        self
    }

    /// Returns the resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the platform-specific type string, defaulting to the name.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        if self.resource_type.is_empty() {
            &self.name
        } else {
            &self.resource_type
        }
    }

    /// Returns `true` when a destroy callback is declared.
    #[must_use]
    pub fn has_destroy(&self) -> bool {
        self.destroy.is_some()
    }

    /// Returns `true` when a status callback is declared.
    #[must_use]
    pub fn has_status(&self) -> bool {
        self.status.is_some()
    }

    /// Checks that the declaration is complete: a non-empty name, a create
    /// callback, and a declared state type whenever the create callback
    /// returns state.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Validation`] describing the first problem
    /// found.
    pub fn validate(&self) -> Result<(), ResourceError> {
        if self.name.trim().is_empty() {
            return Err(ResourceError::Validation {
                message: String::from("resource name must be set"),
            });
        }
        let Some(create) = &self.create else {
            return Err(ResourceError::Validation {
                message: format!("resource '{}' has no creation callback", self.name),
            });
        };

        let state_output = create
            .outputs()
            .iter()
            .find(|out| out.class() == ArgClass::Message);
        match (&self.codec, state_output) {
            (Some(codec), Some(out)) if out.key().subtype() != Some(codec.type_url) => {
                Err(ResourceError::Validation {
                    message: format!(
                        "resource '{}' declares state '{}' but its create callback returns '{}'",
                        self.name,
                        codec.type_url,
                        out.key().subtype().unwrap_or("<none>"),
                    ),
                })
            }
            (None, Some(out)) => Err(ResourceError::Validation {
                message: format!(
                    "resource '{}' create callback returns '{}' but no state type is declared",
                    self.name,
                    out.key().subtype().unwrap_or("<none>"),
                ),
            }),
            _ => Ok(()),
        }
    }

    /// Returns a shared handle to the current state, or `None` when the
    /// resource has not been created or carries no state.
    #[must_use]
    pub fn state<S: Message>(&self) -> Option<Arc<S>> {
        let guard = self.state.lock().expect("state lock poisoned");
        guard
            .as_ref()
            .and_then(|value| Arc::clone(value).downcast::<S>().ok())
    }

    /// Manually sets the state, stamping the monotonic set-state clock.
    ///
    /// Not recommended in normal flows; it exists to migrate from code that
    /// managed resources by hand. Destruction of manually-set resources
    /// follows set-state order, so call this in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Validation`] when `S` is not the declared
    /// state type.
    pub fn set_state<S: Message>(&self, value: S) -> Result<(), ResourceError> {
        let Some(codec) = &self.codec else {
            return Err(ResourceError::Validation {
                message: format!("resource '{}' declares no state type", self.name),
            });
        };
        if codec.type_url != S::TYPE_URL {
            return Err(ResourceError::Validation {
                message: format!(
                    "state value type '{}' does not match declared type '{}'",
                    S::TYPE_URL,
                    codec.type_url
                ),
            });
        }
        *self.state.lock().expect("state lock poisoned") = Some(Arc::new(value));
        self.state_clock.store(
            SET_STATE_CLOCK.fetch_add(1, Ordering::SeqCst) + 1,
            Ordering::SeqCst,
        );
        Ok(())
    }

    /// Returns a copy of the status reports recorded by the last status
    /// run, or `None` when no status has been recorded.
    #[must_use]
    pub fn status(&self) -> Option<StatusResponse> {
        self.status_resp
            .lock()
            .expect("status lock poisoned")
            .clone()
    }

    /// Creates this resource directly, outside a manager.
    ///
    /// # Errors
    ///
    /// Validation failures or the create callback's error.
    pub fn create(&self, values: ValueSet) -> Result<(), ResourceError> {
        self.validate()?;
        let func = self.create_func(None);
        func.call(values, &[])
            .map(|_| ())
            .map_err(|source| ResourceError::Create { source })
    }

    /// Destroys this resource directly, outside a manager.
    ///
    /// # Errors
    ///
    /// Validation failures or the destroy callback's error.
    pub fn destroy(&self, values: ValueSet) -> Result<(), ResourceError> {
        self.validate()?;
        let func = self.destroy_func(&[], None, None);
        func.call(values, &[])
            .map(|_| ())
            .map_err(|source| ResourceError::Destroy { source })
    }

    /// Renders this resource as a declared-resource message.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::State`] when the state cannot be
    /// serialized.
    pub fn declared_resource(&self) -> Result<DeclaredResource, ResourceError> {
        let (state, state_json) = self.encoded_state()?;
        Ok(DeclaredResource {
            name: self.name.clone(),
            resource_type: self.resource_type().to_owned(),
            platform: self.platform.clone(),
            category_display_hint: self.category,
            state,
            state_json,
        })
    }

    fn destroyed_resource(&self) -> Result<DestroyedResource, ResourceError> {
        let (state, state_json) = self.encoded_state()?;
        Ok(DestroyedResource {
            name: self.name.clone(),
            resource_type: self.resource_type().to_owned(),
            platform: self.platform.clone(),
            state,
            state_json,
        })
    }

    fn encoded_state(&self) -> Result<(Option<Envelope>, String), ResourceError> {
        let guard = self.state.lock().expect("state lock poisoned");
        match (&self.codec, guard.as_ref()) {
            (Some(codec), Some(value)) => {
                let envelope =
                    (codec.encode)(value.as_ref()).map_err(|source| ResourceError::State {
                        name: self.name.clone(),
                        source,
                    })?;
                let json =
                    (codec.render_json)(value.as_ref()).map_err(|source| ResourceError::State {
                        name: self.name.clone(),
                        source,
                    })?;
                Ok((Some(envelope), json))
            }
            _ => Ok((None, String::from("null"))),
        }
    }

    /// Serializes this resource's state for the manager state envelope.
    pub(crate) fn proto_state(&self) -> Result<ResourceState, ResourceError> {
        let (raw, state_json) = self.encoded_state()?;
        Ok(ResourceState {
            name: self.name.clone(),
            raw,
            state_json,
        })
    }

    /// Repopulates state from its serialized form, discarding any state
    /// currently loaded.
    pub(crate) fn load_state(&self, stored: &ResourceState) -> Result<(), ResourceError> {
        let Some(raw) = &stored.raw else {
            return Ok(());
        };
        let Some(codec) = &self.codec else {
            return Err(ResourceError::Validation {
                message: format!(
                    "resource '{}' has stored state but declares no state type",
                    self.name
                ),
            });
        };
        let value = (codec.decode)(raw).map_err(|source| ResourceError::LoadState {
            name: self.name.clone(),
            source,
        })?;
        *self.state.lock().expect("state lock poisoned") = Some(value);
        Ok(())
    }

    pub(crate) fn state_is_set(&self) -> bool {
        self.state.lock().expect("state lock poisoned").is_some()
    }

    pub(crate) fn state_clock(&self) -> u32 {
        self.state_clock.load(Ordering::SeqCst)
    }

    pub(crate) fn state_value(&self) -> Option<TypedValue> {
        let codec = self.codec.as_ref()?;
        let guard = self.state.lock().expect("state lock poisoned");
        guard
            .as_ref()
            .map(|value| TypedValue::from_erased((codec.key)(), Arc::clone(value)))
    }

    /// Builds the creation wrapper used by the solver.
    ///
    /// The wrapper's inputs are the callback's own inputs; its outputs are
    /// this resource's marker plus the state value, which is what lets
    /// dependent resources (and the manager's sink) pull this resource into
    /// the plan.
    pub(crate) fn create_func(&self, order: Option<Arc<Mutex<Vec<String>>>>) -> FuncDef {
        let user = self
            .create
            .clone()
            .expect("validated resource has a create callback");
        let name = self.name.clone();
        let codec = self.codec;
        let state_cell = Arc::clone(&self.state);

        let mut outputs = vec![ParamSpec::new(marker_key(&name), ArgClass::Ambient)];
        if let Some(codec) = &codec {
            outputs.push(ParamSpec::new((codec.key)(), ArgClass::Message));
        }

        FuncDef::raw(
            format!("resource-create/{name}"),
            user.inputs().to_vec(),
            outputs,
            move |set| {
                // Record the attempt before invoking: a failed create may
                // still have made external changes worth rolling back.
                if let Some(order) = &order {
                    order.lock().expect("order lock poisoned").push(name.clone());
                }

                let outs = user.invoke(set)?;
                let mut results = vec![marker_value(&name)];
                if let Some(codec) = &codec {
                    let key = (codec.key)();
                    let state = outs
                        .into_iter()
                        .find(|v| v.key().type_id() == key.type_id())
                        .ok_or_else(|| FuncError::InvalidArgs {
                            message: format!(
                                "create callback for resource '{name}' returned no state value"
                            ),
                        })?;
                    *state_cell.lock().expect("state lock poisoned") =
                        Some(state.value_arc());
                    results.push(TypedValue::from_erased(key, state.value_arc()));
                }
                Ok(results)
            },
        )
    }

    /// Builds the destruction wrapper used by the solver.
    ///
    /// `deps` are the names of resources created after this one; their
    /// markers become inputs, which forces the solver to destroy later
    /// resources first. Resources without a destroy callback get a no-op
    /// body but keep their place in the ordering.
    pub(crate) fn destroy_func(
        &self,
        deps: &[String],
        declared_out: Option<Arc<Mutex<Vec<DeclaredResource>>>>,
        destroyed_out: Option<Arc<Mutex<Vec<DestroyedResource>>>>,
    ) -> FuncDef {
        debug_assert!(
            !deps.contains(&self.name),
            "resource dependent on itself for destroy"
        );

        let user = self.destroy.clone();
        let name = self.name.clone();
        let codec = self.codec;
        let state_cell = Arc::clone(&self.state);
        let status_cell = Arc::clone(&self.status_resp);
        let snapshot = SnapshotHandles {
            resource_type: self.resource_type().to_owned(),
            platform: self.platform.clone(),
            category: self.category,
        };

        let mut inputs = user.as_ref().map(|f| f.inputs().to_vec()).unwrap_or_default();
        for dep in deps {
            inputs.push(ParamSpec::new(marker_key(dep), ArgClass::Ambient));
        }
        let outputs = vec![ParamSpec::new(marker_key(&name), ArgClass::Ambient)];

        FuncDef::raw(
            format!("resource-destroy/{name}"),
            inputs,
            outputs,
            move |set| {
                let mut child = set.clone();
                if let Some(codec) = &codec {
                    let state = state_cell
                        .lock()
                        .expect("state lock poisoned")
                        .clone()
                        .unwrap_or_else(|| (codec.empty)());
                    child.insert(TypedValue::from_erased((codec.key)(), state));
                }

                if let Some(user) = &user {
                    user.invoke(&child)?;
                }

                // Snapshot for the report buckets before the state resets.
                let report = snapshot.capture(&name, &codec, &state_cell);
                if user.is_some() {
                    if let Some(out) = &destroyed_out {
                        out.lock().expect("bucket lock poisoned").push(report.1);
                    }
                } else if let Some(out) = &declared_out {
                    out.lock().expect("bucket lock poisoned").push(report.0);
                }

                *state_cell.lock().expect("state lock poisoned") = None;
                *status_cell.lock().expect("status lock poisoned") = None;

                Ok(vec![marker_value(&name)])
            },
        )
    }

    /// Builds the status wrapper used by the solver.
    pub(crate) fn status_func(&self) -> FuncDef {
        let user = self.status.clone();
        let name = self.name.clone();
        let status_cell = Arc::clone(&self.status_resp);

        let inputs = user.as_ref().map(|f| f.inputs().to_vec()).unwrap_or_default();
        let outputs = vec![ParamSpec::new(marker_key(&name), ArgClass::Ambient)];

        FuncDef::raw(
            format!("resource-status/{name}"),
            inputs,
            outputs,
            move |set| {
                if let Some(user) = &user {
                    let outs = user.invoke(set)?;
                    let response = outs
                        .into_iter()
                        .find_map(|v| v.value().downcast_ref::<StatusResponse>().cloned())
                        .unwrap_or_default();
                    *status_cell.lock().expect("status lock poisoned") = Some(response);
                }
                Ok(vec![marker_value(&name)])
            },
        )
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("resource_type", &self.resource_type())
            .field("platform", &self.platform)
            .field("category", &self.category)
            .field("has_state", &self.codec.is_some())
            .field("has_destroy", &self.destroy.is_some())
            .field("has_status", &self.status.is_some())
            .finish_non_exhaustive()
    }
}

/// Display fields captured for destroy-time report snapshots.
struct SnapshotHandles {
    resource_type: String,
    platform: String,
    category: ResourceCategory,
}

impl SnapshotHandles {
    fn capture(
        &self,
        name: &str,
        codec: &Option<StateCodec>,
        state_cell: &Arc<Mutex<Option<ErasedValue>>>,
    ) -> (DeclaredResource, DestroyedResource) {
        let (state, state_json) = match (codec, state_cell.lock().expect("state lock").as_ref()) {
            (Some(codec), Some(value)) => {
                let envelope = (codec.encode)(value.as_ref()).ok();
                let json = (codec.render_json)(value.as_ref())
                    .unwrap_or_else(|_| String::from("null"));
                (envelope, json)
            }
            _ => (None, String::from("null")),
        };
        (
            DeclaredResource {
                name: name.to_owned(),
                resource_type: self.resource_type.clone(),
                platform: self.platform.clone(),
                category_display_hint: self.category,
                state: state.clone(),
                state_json: state_json.clone(),
            },
            DestroyedResource {
                name: name.to_owned(),
                resource_type: self.resource_type.clone(),
                platform: self.platform.clone(),
                state,
                state_json,
            },
        )
    }
}
