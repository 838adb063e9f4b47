//! Component interfaces a plugin can implement.
//!
//! A component is a plugin capability of a known kind: builders make
//! artifacts, registries push them, platforms deploy them, release
//! managers route traffic to them, config sourcers resolve dynamic
//! configuration, and task launchers run one-shot work. Every operation is
//! exposed as a [`FuncDef`] handle so the funcspec engine can advertise
//! and invoke it with host-supplied values.
//!
//! Optional capabilities (authentication, destruction, exec, logs, status,
//! generation) are separate traits; a plugin registers the ones it
//! implements explicitly on its [`crate::adapter::Capabilities`]. The
//! adapter probes for each and the host-side stub exposes exactly what was
//! advertised.

use gantry_funcspec::FuncDef;
use strum::{Display, EnumString};

use crate::config::ConfigStruct;
use crate::error::PluginError;

/// The known component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ComponentKind {
    /// Builds an artifact from source.
    Builder,
    /// Pushes artifacts to an artifact registry.
    Registry,
    /// Deploys artifacts.
    Platform,
    /// Routes traffic to a deployment.
    ReleaseManager,
    /// Resolves dynamic configuration values.
    ConfigSourcer,
    /// Launches one-shot tasks.
    TaskLauncher,
}

impl ComponentKind {
    /// Returns the wire service name for this kind.
    #[must_use]
    pub fn service_name(self) -> String {
        self.to_string()
    }
}

/// A plugin with decodable configuration.
pub trait Configurable: Send + Sync {
    /// Returns the structural descriptor of the configuration shape for
    /// the host's config decoder.
    fn config_struct(&self) -> ConfigStruct;

    /// Receives the decoded configuration bytes and applies them.
    ///
    /// # Errors
    ///
    /// Any [`PluginError`]; configuration failures abort the operation
    /// before it starts.
    fn configure(&self, json: &[u8]) -> Result<(), PluginError>;
}

/// A plugin that documents itself.
pub trait Documented: Send + Sync {
    /// Returns the documentation bundle.
    ///
    /// # Errors
    ///
    /// Any [`PluginError`] from assembling the bundle.
    fn documentation(&self) -> Result<gantry_docs::Documentation, PluginError>;
}

/// Builds an artifact from application source.
pub trait Builder: Send + Sync {
    /// Returns the function implementing the build operation.
    fn build_func(&self) -> FuncDef;
}

/// Manages artifacts in an artifact registry.
pub trait Registry: Send + Sync {
    /// Returns the function implementing the push operation.
    fn push_func(&self) -> FuncDef;
}

/// Deploys artifacts onto a platform.
pub trait Platform: Send + Sync {
    /// Returns the function implementing the deploy operation.
    fn deploy_func(&self) -> FuncDef;
}

/// Optional: a platform that provides a default release manager used when
/// none is configured.
pub trait PlatformReleaser: Send + Sync {
    /// Returns the function producing the default releaser. It must work
    /// with no configuration.
    fn default_releaser_func(&self) -> FuncDef;
}

/// Makes a deployment receive traffic.
pub trait ReleaseManager: Send + Sync {
    /// Returns the function implementing the release operation.
    fn release_func(&self) -> FuncDef;
}

/// Resolves configuration values from an external system.
pub trait ConfigSourcer: Send + Sync {
    /// Returns the function reading configuration values.
    fn read_func(&self) -> FuncDef;

    /// Returns the function stopping any background watchers.
    fn stop_func(&self) -> FuncDef;
}

/// Launches one-shot tasks (often on-demand runners).
pub trait TaskLauncher: Send + Sync {
    /// Returns the function starting a task.
    fn start_task_func(&self) -> FuncDef;

    /// Returns the function stopping a task.
    fn stop_task_func(&self) -> FuncDef;

    /// Returns the function watching a task to completion.
    fn watch_task_func(&self) -> FuncDef;
}

/// Optional: cleans up resources a component created.
pub trait Destroyer: Send + Sync {
    /// Returns the function implementing the destroy operation.
    fn destroy_func(&self) -> FuncDef;
}

/// Optional: cleanup run once per workspace destroy, after all individual
/// destroys complete. May be called multiple times; implementations should
/// be idempotent.
pub trait WorkspaceDestroyer: Send + Sync {
    /// Returns the function implementing the workspace destroy operation.
    fn destroy_workspace_func(&self) -> FuncDef;
}

/// Optional: acquires and validates credentials for a plugin.
pub trait Authenticator: Send + Sync {
    /// Returns the function acquiring credentials.
    fn auth_func(&self) -> FuncDef;

    /// Returns the function validating existing credentials.
    fn validate_auth_func(&self) -> FuncDef;
}

/// Optional: provides an exec session into a deployment.
pub trait Execer: Send + Sync {
    /// Returns the function running an exec session.
    fn exec_func(&self) -> FuncDef;
}

/// Optional: serves application logs for a deployment.
pub trait LogPlatform: Send + Sync {
    /// Returns the function producing log batches.
    fn logs_func(&self) -> FuncDef;
}

/// Optional: supplies a stable generation id so operations can update
/// resources in place across deployments.
pub trait Generation: Send + Sync {
    /// Returns the function computing the generation id.
    fn generation_func(&self) -> FuncDef;
}

/// Optional: reports the current health of previously created resources.
pub trait Status: Send + Sync {
    /// Returns the function building a status report.
    fn status_func(&self) -> FuncDef;
}
