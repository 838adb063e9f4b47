//! Ambient argument types injected into every dynamic call.
//!
//! These are the values a plugin function can take as parameters without
//! them ever being advertised in its funcspec: the host (or the server
//! adapter) injects them locally on each call. Everything here is cheap to
//! clone; handles share their underlying state.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use gantry_funcspec::{ambient_arg, FuncDef, FuncError};
use gantry_proto::{DeclaredResourcesResp, DestroyedResourcesResp};

use crate::wire::Connection;

/// Named logging handle emitting through `tracing`.
///
/// Injected as an ambient value so plugin callbacks can log under the
/// plugin's name without owning a subscriber.
#[derive(Clone, Debug)]
pub struct Logger {
    name: String,
}

impl Logger {
    /// Creates a logger named after the plugin.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Creates a child logger with a suffixed name.
    #[must_use]
    pub fn named(&self, suffix: &str) -> Self {
        Self {
            name: format!("{}.{suffix}", self.name),
        }
    }

    /// Returns the logger name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logs at debug level.
    pub fn debug(&self, message: &str) {
        tracing::debug!(target: "gantry_plugin::plugin", plugin = %self.name, "{message}");
    }

    /// Logs at info level.
    pub fn info(&self, message: &str) {
        tracing::info!(target: "gantry_plugin::plugin", plugin = %self.name, "{message}");
    }

    /// Logs at warn level.
    pub fn warn(&self, message: &str) {
        tracing::warn!(target: "gantry_plugin::plugin", plugin = %self.name, "{message}");
    }

    /// Logs at error level.
    pub fn error(&self, message: &str) {
        tracing::error!(target: "gantry_plugin::plugin", plugin = %self.name, "{message}");
    }
}

ambient_arg!(Logger);

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    deadline: Mutex<Option<Instant>>,
    parent: Option<Arc<CancelInner>>,
}

impl CancelInner {
    fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        if let Some(deadline) = *self.deadline.lock().expect("deadline lock poisoned") {
            if Instant::now() >= deadline {
                return true;
            }
        }
        self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

/// Cooperative cancellation handle.
///
/// Every blocking operation in the runtime checks its token; a cancelled
/// token makes in-flight reads return a cancelled error and in-flight
/// writes drop frames rather than block. Timeouts are deadlines layered on
/// a child token.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child token that is cancelled whenever this one is, and
    /// additionally after `deadline` passes.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                deadline: Mutex::new(Some(deadline)),
                parent: Some(Arc::clone(&self.inner)),
            }),
        }
    }

    /// Creates a child token cancelled with this one.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                deadline: Mutex::new(None),
                parent: Some(Arc::clone(&self.inner)),
            }),
        }
    }

    /// Fires the token.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once the token (or an ancestor, or a deadline) has
    /// fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Errors with [`FuncError::Cancelled`] once the token has fired.
    pub fn check(&self) -> Result<(), FuncError> {
        if self.is_cancelled() {
            Err(FuncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

ambient_arg!(CancelToken);

/// Deferred cleanup actions accumulated during a call.
///
/// Converters with side effects (opened sub-streams, spawned pumps)
/// register closers here; the adapter closes everything when the call
/// completes, success or failure.
#[derive(Clone, Default)]
pub struct Cleanup {
    actions: Arc<Mutex<Vec<Box<dyn FnOnce() + Send>>>>,
}

impl Cleanup {
    /// Creates an empty cleanup list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cleanup action, run in reverse registration order.
    pub fn defer(&self, action: impl FnOnce() + Send + 'static) {
        self.actions
            .lock()
            .expect("cleanup lock poisoned")
            .push(Box::new(action));
    }

    /// Runs and clears all registered actions.
    pub fn close(&self) {
        let mut actions = self.actions.lock().expect("cleanup lock poisoned");
        while let Some(action) = actions.pop() {
            action();
        }
    }
}

impl std::fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.actions.lock().expect("cleanup lock poisoned").len();
        f.debug_struct("Cleanup").field("pending", &len).finish()
    }
}

/// Component-scoped data directories.
///
/// `cache` holds rebuildable artifacts; `data` holds state that must
/// survive restarts. Both are created on construction.
#[derive(Clone, Debug)]
pub struct DataDir {
    cache: PathBuf,
    data: PathBuf,
}

impl DataDir {
    /// Creates the cache and data directories under a root.
    ///
    /// # Errors
    ///
    /// Propagates directory-creation failures.
    pub fn from_root(root: &Path) -> io::Result<Self> {
        let cache = root.join("cache");
        let data = root.join("data");
        std::fs::create_dir_all(&cache)?;
        std::fs::create_dir_all(&data)?;
        Ok(Self { cache, data })
    }

    /// Directory for rebuildable cached artifacts.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache
    }

    /// Directory for durable component data.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data
    }
}

ambient_arg!(DataDir);

/// Internal plumbing injected into adapter-driven calls: the connection
/// (for sub-stream work), the registered mappers, and the call's cleanup
/// list.
#[derive(Clone)]
pub struct Internal {
    /// Connection the current call arrived on.
    pub conn: Arc<Connection>,
    /// Converters available to the call.
    pub mappers: Vec<FuncDef>,
    /// Cleanup actions closed when the call completes.
    pub cleanup: Cleanup,
}

impl std::fmt::Debug for Internal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Internal")
            .field("mappers", &self.mappers.len())
            .finish_non_exhaustive()
    }
}

ambient_arg!(Internal);

/// Out-parameter collector for resources declared by an operation.
#[derive(Clone, Debug, Default)]
pub struct DeclaredCollector(pub Arc<Mutex<DeclaredResourcesResp>>);

ambient_arg!(DeclaredCollector);

/// Out-parameter collector for resources destroyed by an operation.
#[derive(Clone, Debug, Default)]
pub struct DestroyedCollector(pub Arc<Mutex<DestroyedResourcesResp>>);

ambient_arg!(DestroyedCollector);

#[cfg(test)]
mod tests;
