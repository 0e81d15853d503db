//! Per-VM data shared between bindings, the loader and the callback bridge.
//!
//! Every script environment carries two pieces of app data:
//!
//! - [`RuntimeServices`]: process-wide services (bindings, callback bridge,
//!   diagnostic sink, host services, settings), shared by all environments
//! - [`EnvironmentState`]: what belongs to this one environment (module
//!   directory, package metadata, owning context)
//!
//! Bindings look both up from the `Lua` they are called with instead of
//! capturing them, so a single binding table serves every environment.

use mlua::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tactica_application::{DiagnosticSink, DispatchReport, HostServicesPort, RuntimeSettings};
use tactica_domain::{NativeEvent, PackageKind, PackageMeta, ScriptDiagnostic, Shared, share};

use super::bindings::BindingRegistry;
use super::callback_bridge::CallbackBridge;
use super::context::ScriptContext;
use super::loader::RuntimeShared;

/// Services shared by every environment of one runtime.
pub struct RuntimeServices {
    pub settings: RuntimeSettings,
    pub bindings: Arc<BindingRegistry>,
    pub bridge: CallbackBridge,
    pub diagnostics: Arc<dyn DiagnosticSink>,
    pub host: Arc<dyn HostServicesPort>,
}

impl RuntimeServices {
    pub fn new(
        settings: RuntimeSettings,
        bindings: Arc<BindingRegistry>,
        diagnostics: Arc<dyn DiagnosticSink>,
        host: Arc<dyn HostServicesPort>,
    ) -> Self {
        Self {
            settings,
            bindings,
            bridge: CallbackBridge::new(),
            diagnostics,
            host,
        }
    }

    /// Fire the callbacks for `events` in order, reporting failures to the sink.
    pub fn dispatch(&self, events: Vec<NativeEvent>) -> DispatchReport {
        self.bridge.dispatch(events, self.diagnostics.as_ref())
    }

    pub fn report(&self, diagnostic: &ScriptDiagnostic) {
        self.diagnostics.report(diagnostic);
    }
}

/// State owned by one script environment.
pub struct EnvironmentState {
    /// Human-readable name of the module, used as diagnostic context.
    pub label: String,
    /// Directory local includes resolve against.
    pub dir: PathBuf,
    pub entry: PathBuf,
    pub meta: Shared<PackageMeta>,
    pub context: Weak<ScriptContext>,
    pub runtime: Weak<RuntimeShared>,
    /// Shared-library includes currently running in this environment.
    library_depth: AtomicUsize,
}

impl EnvironmentState {
    pub fn new(
        entry: &Path,
        dir: &Path,
        kind: PackageKind,
        context: Weak<ScriptContext>,
        runtime: Weak<RuntimeShared>,
    ) -> Self {
        Self {
            label: entry.display().to_string(),
            dir: dir.to_path_buf(),
            entry: entry.to_path_buf(),
            meta: share(PackageMeta::new(kind)),
            context,
            runtime,
            library_depth: AtomicUsize::new(0),
        }
    }

    /// True while a shared library's code is running in this environment.
    pub fn in_library(&self) -> bool {
        self.library_depth.load(Ordering::SeqCst) > 0
    }

    pub fn enter_library(&self) {
        self.library_depth.fetch_add(1, Ordering::SeqCst);
    }

    pub fn leave_library(&self) {
        self.library_depth.fetch_sub(1, Ordering::SeqCst);
    }

    /// Value of the `_modpath` global: the module directory with a trailing `/`.
    pub fn modpath(&self) -> String {
        let dir = self.dir.display().to_string();
        if dir.ends_with('/') {
            dir
        } else {
            format!("{}/", dir)
        }
    }
}

/// Runtime services of the environment `lua` belongs to.
pub fn services(lua: &Lua) -> LuaResult<Arc<RuntimeServices>> {
    lua.app_data_ref::<Arc<RuntimeServices>>()
        .map(|s| Arc::clone(&s))
        .ok_or_else(|| LuaError::external("script runtime services are not installed"))
}

/// State of the environment `lua` belongs to.
pub fn environment(lua: &Lua) -> LuaResult<Arc<EnvironmentState>> {
    lua.app_data_ref::<Arc<EnvironmentState>>()
        .map(|s| Arc::clone(&s))
        .ok_or_else(|| LuaError::external("not running inside a module environment"))
}

/// The owning runtime, for bindings that load or look up other modules.
pub fn runtime(lua: &Lua) -> LuaResult<Arc<RuntimeShared>> {
    environment(lua)?
        .runtime
        .upgrade()
        .ok_or_else(|| LuaError::external("script runtime has been shut down"))
}
