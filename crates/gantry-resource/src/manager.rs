//! The resource manager: lifecycle over a set of declared resources.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use gantry_funcspec::{solve, FuncDef, ValueKey, ValueSet};
use gantry_proto::{
    DeclaredResource, DeclaredResourcesResp, DestroyedResource, DestroyedResourcesResp, Health,
    ManagerState, StatusReport, StatusResource,
};

use crate::error::ResourceError;
use crate::resource::{marker_key, Resource};

/// Tracing target for resource manager operations.
const RESOURCE_TARGET: &str = "gantry_resource::manager";

/// Manages the lifecycle and state of one or more resources.
///
/// Creation order is determined by the solver from the create callbacks'
/// value-type dependencies; destruction reverses the recorded order. On a
/// partial create failure the manager automatically rolls back whatever was
/// attempted, in reverse order.
///
/// # Example
///
/// ```
/// use gantry_funcspec::ValueSet;
/// use gantry_resource::{Manager, Resource};
///
/// let mut manager = Manager::new()
///     .with_resource(Resource::new("network").with_create(
///         |subnet: String| -> Result<(), std::io::Error> {
///             let _ = subnet;
///             Ok(())
///         },
///     ))
///     .with_resource(Resource::new("container").with_create(
///         |subnet: String| -> Result<(), std::io::Error> {
///             let _ = subnet;
///             Ok(())
///         },
///     ));
///
/// manager
///     .create_all(ValueSet::new().with(String::from("10.0.0.0/24")))
///     .expect("create");
/// manager.destroy_all(ValueSet::new()).expect("destroy");
/// ```
#[derive(Debug, Default)]
pub struct Manager {
    resources: Vec<Resource>,
    create_order: Vec<String>,
    providers: Vec<FuncDef>,
    declared_out: Option<Arc<Mutex<DeclaredResourcesResp>>>,
    destroyed_out: Option<Arc<Mutex<DestroyedResourcesResp>>>,
}

impl Manager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource. A resource with the same name as an earlier one
    /// replaces it; that is allowed but almost always a mistake, so it is
    /// logged.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        if let Some(existing) = self
            .resources
            .iter_mut()
            .find(|r| r.name() == resource.name())
        {
            warn!(
                target: RESOURCE_TARGET,
                name = resource.name(),
                "duplicate resource name, replacing earlier declaration"
            );
            *existing = resource;
        } else {
            self.resources.push(resource);
        }
        self
    }

    /// Registers a shared value-provider function. Providers run at most
    /// once per create or destroy pass, so expensive handles (API clients,
    /// cloud sessions) are shared across every resource callback.
    #[must_use]
    pub fn with_provider(mut self, provider: FuncDef) -> Self {
        self.providers.push(provider);
        self
    }

    /// Attaches a collector that receives one declared-resource entry per
    /// resource after a successful create pass.
    #[must_use]
    pub fn with_declared_resources_resp(
        mut self,
        resp: Arc<Mutex<DeclaredResourcesResp>>,
    ) -> Self {
        self.declared_out = Some(resp);
        self
    }

    /// Attaches a collector that receives destroyed-resource entries during
    /// destroy passes.
    #[must_use]
    pub fn with_destroyed_resources_resp(
        mut self,
        resp: Arc<Mutex<DestroyedResourcesResp>>,
    ) -> Self {
        self.destroyed_out = Some(resp);
        self
    }

    /// Looks up a resource by name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name() == name)
    }

    /// Returns the recorded creation order.
    #[must_use]
    pub fn create_order(&self) -> &[String] {
        &self.create_order
    }

    /// Validates every resource declaration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResourceError::Validation`] found.
    pub fn validate(&self) -> Result<(), ResourceError> {
        for resource in &self.resources {
            resource.validate()?;
        }
        Ok(())
    }

    /// Creates all resources in dependency order.
    ///
    /// The caller's values are available to every create callback. On any
    /// failure the manager rolls back what was attempted, in reverse order,
    /// and returns [`ResourceError::Create`] (or
    /// [`ResourceError::Rollback`] when cleanup failed too).
    pub fn create_all(&mut self, values: ValueSet) -> Result<(), ResourceError> {
        self.validate()?;

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut converters: Vec<FuncDef> = self
            .resources
            .iter()
            .map(|r| r.create_func(Some(Arc::clone(&order))))
            .collect();
        converters.extend(self.providers.iter().cloned());

        let targets: Vec<ValueKey> = self
            .resources
            .iter()
            .map(|r| marker_key(r.name()))
            .collect();

        let run = || -> Result<(), ResourceError> {
            let plan = solve(&targets, &values, &converters)
                .map_err(|source| ResourceError::Create { source })?;
            let mut resolved = values.clone();
            plan.execute(&mut resolved)
                .map_err(|source| ResourceError::Create { source })?;
            Ok(())
        };

        match run() {
            Ok(()) => {
                self.create_order = order.lock().expect("order lock poisoned").clone();
                debug!(
                    target: RESOURCE_TARGET,
                    order = ?self.create_order,
                    "all resources created"
                );
                self.emit_declared()?;
                Ok(())
            }
            Err(original) => {
                let attempted = order.lock().expect("order lock poisoned").clone();
                warn!(
                    target: RESOURCE_TARGET,
                    error = %original,
                    attempted = ?attempted,
                    "create failed, rolling back"
                );
                match self.destroy_ordered(&attempted, &values) {
                    Ok(()) => Err(original),
                    Err(rollback) => Err(ResourceError::Rollback {
                        original: Box::new(original),
                        rollback: Box::new(rollback),
                    }),
                }
            }
        }
    }

    /// Destroys all resources in reverse creation order.
    ///
    /// When no creation order was recorded (state populated through manual
    /// set-state calls), the order falls back to the monotonic set-state
    /// clock; resources with no state are skipped in that case.
    pub fn destroy_all(&mut self, values: ValueSet) -> Result<(), ResourceError> {
        self.validate()?;

        let ordered: Vec<String> = if self.create_order.is_empty() {
            let mut stamped: Vec<(u32, String)> = self
                .resources
                .iter()
                .filter(|r| r.state_is_set())
                .map(|r| (r.state_clock(), r.name().to_owned()))
                .collect();
            stamped.sort();
            stamped.into_iter().map(|(_, name)| name).collect()
        } else {
            self.create_order.clone()
        };

        self.destroy_ordered(&ordered, &values)?;
        self.create_order.clear();
        Ok(())
    }

    /// Destroys the named resources, `ordered` being their creation order.
    fn destroy_ordered(&self, ordered: &[String], values: &ValueSet) -> Result<(), ResourceError> {
        if ordered.is_empty() {
            return Ok(());
        }

        let declared_bucket = Arc::new(Mutex::new(Vec::<DeclaredResource>::new()));
        let destroyed_bucket = Arc::new(Mutex::new(Vec::<DestroyedResource>::new()));

        let mut converters: Vec<FuncDef> = Vec::with_capacity(ordered.len());
        for (idx, name) in ordered.iter().enumerate() {
            let resource = self
                .resource(name)
                .ok_or_else(|| ResourceError::UnknownResource { name: name.clone() })?;
            let deps: Vec<String> = ordered[idx + 1..].to_vec();
            converters.push(resource.destroy_func(
                &deps,
                Some(Arc::clone(&declared_bucket)),
                Some(Arc::clone(&destroyed_bucket)),
            ));
        }
        converters.extend(self.providers.iter().cloned());

        let targets: Vec<ValueKey> = ordered.iter().map(|name| marker_key(name)).collect();
        let plan = solve(&targets, values, &converters)
            .map_err(|source| ResourceError::Destroy { source })?;
        let mut resolved = values.clone();
        plan.execute(&mut resolved)
            .map_err(|source| ResourceError::Destroy { source })?;

        if let Some(out) = &self.declared_out {
            out.lock()
                .expect("declared collector lock poisoned")
                .declared
                .extend(declared_bucket.lock().expect("bucket lock poisoned").drain(..));
        }
        if let Some(out) = &self.destroyed_out {
            out.lock()
                .expect("destroyed collector lock poisoned")
                .destroyed
                .extend(destroyed_bucket.lock().expect("bucket lock poisoned").drain(..));
        }
        Ok(())
    }

    fn emit_declared(&self) -> Result<(), ResourceError> {
        let Some(out) = &self.declared_out else {
            return Ok(());
        };
        let mut declared = Vec::with_capacity(self.resources.len());
        for resource in &self.resources {
            declared.push(resource.declared_resource()?);
        }
        out.lock()
            .expect("declared collector lock poisoned")
            .declared
            .extend(declared);
        Ok(())
    }

    /// Runs every resource's status callback and returns the flattened
    /// reports, each tagged with the declaring resource's name.
    ///
    /// A failing status callback is logged and skipped; it does not abort
    /// the other resources' reports.
    pub fn status_all(&self) -> Result<Vec<StatusResource>, ResourceError> {
        self.validate()?;

        let mut values = ValueSet::new();
        for resource in &self.resources {
            if let Some(state) = resource.state_value() {
                values.insert(state);
            }
        }

        for resource in &self.resources {
            let func = resource.status_func();
            if let Err(source) = func.call(values.clone(), &self.providers) {
                warn!(
                    target: RESOURCE_TARGET,
                    resource = resource.name(),
                    error = %ResourceError::Status {
                        name: resource.name().to_owned(),
                        source,
                    },
                    "status callback failed, skipping resource"
                );
            }
        }

        Ok(self.collect_status())
    }

    fn collect_status(&self) -> Vec<StatusResource> {
        let mut reports = Vec::new();
        for resource in &self.resources {
            let Some(response) = resource.status() else {
                continue;
            };
            for mut report in response.resources {
                report.declared_resource = resource.name().to_owned();
                reports.push(report);
            }
        }
        reports
    }

    /// Builds an aggregate status report from the recorded status
    /// responses.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::EmptyStatus`] when no resource reported
    /// status.
    pub fn status_report(&self) -> Result<StatusReport, ResourceError> {
        let resources = self.collect_status();
        let (health, health_message) = health_summary(&resources)?;
        let generated_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Ok(StatusReport {
            resources,
            health,
            health_message,
            generated_millis,
            external: true,
        })
    }

    /// Serializes the manager's state: the creation order plus every
    /// resource's state envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::State`] when a resource state cannot be
    /// serialized.
    pub fn state(&self) -> Result<ManagerState, ResourceError> {
        let mut resources = Vec::with_capacity(self.resources.len());
        for resource in &self.resources {
            resources.push(resource.proto_state()?);
        }
        Ok(ManagerState {
            order: self.create_order.clone(),
            resources,
        })
    }

    /// Restores manager state produced by [`Manager::state`], discarding
    /// any state currently loaded.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::UnknownResource`] when the stored state
    /// names a resource this manager does not declare, or
    /// [`ResourceError::LoadState`] when a state payload cannot be decoded.
    pub fn load_state(&mut self, state: &ManagerState) -> Result<(), ResourceError> {
        for stored in &state.resources {
            let resource = self
                .resource(&stored.name)
                .ok_or_else(|| ResourceError::UnknownResource {
                    name: stored.name.clone(),
                })?;
            resource.load_state(stored)?;
        }
        self.create_order = state.order.clone();
        Ok(())
    }
}

/// Applies the health-summary rule to a set of per-resource reports.
///
/// All healths equal yields that health; a mix yields `Partial` with a
/// message enumerating `count type health` triples sorted by health order,
/// then by resource type.
fn health_summary(resources: &[StatusResource]) -> Result<(Health, String), ResourceError> {
    if resources.is_empty() {
        return Err(ResourceError::EmptyStatus);
    }

    let first = resources[0].health;
    if resources.iter().all(|r| r.health == first) {
        return Ok((
            first,
            format!("All {} resources are reporting {first}", resources.len()),
        ));
    }

    let mut counts: std::collections::BTreeMap<(Health, String), usize> =
        std::collections::BTreeMap::new();
    for resource in resources {
        *counts
            .entry((resource.health, resource.resource_type.clone()))
            .or_default() += 1;
    }
    let message = counts
        .iter()
        .map(|((health, resource_type), count)| format!("{count} {resource_type} {health}"))
        .collect::<Vec<_>>()
        .join(", ");
    Ok((Health::Partial, message))
}
