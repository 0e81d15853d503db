//! Ready-made script environment for unit tests.

use mlua::prelude::*;
use std::sync::{Arc, Weak};
use tactica_application::{CollectingDiagnostics, NullHostServices, RuntimeSettings};
use tactica_domain::PackageKind;
use tempfile::TempDir;

use super::bindings::standard_registry;
use super::context::ScriptContext;
use super::environment::{EnvironmentState, RuntimeServices};
use super::sandbox;

/// A sandboxed environment with every binding installed and no loader behind it.
pub struct TestEnvironment {
    pub lua: Lua,
    pub diagnostics: Arc<CollectingDiagnostics>,
    pub services: Arc<RuntimeServices>,
    pub env: Arc<EnvironmentState>,
    pub context: Arc<ScriptContext>,
    pub dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_settings(RuntimeSettings::default())
    }

    pub fn with_settings(settings: RuntimeSettings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let services = Arc::new(RuntimeServices::new(
            settings,
            Arc::new(standard_registry().unwrap()),
            diagnostics.clone(),
            Arc::new(NullHostServices),
        ));

        let entry = dir.path().join("entry.lua");
        let context = Arc::new(ScriptContext::new(entry.display().to_string()));
        let env = Arc::new(EnvironmentState::new(
            &entry,
            dir.path(),
            PackageKind::Character,
            Arc::downgrade(&context),
            Weak::new(),
        ));

        let lua = sandbox::new_environment(&services.settings, &env.label).unwrap();
        lua.set_app_data(Arc::clone(&services));
        lua.set_app_data(Arc::clone(&env));
        services.bindings.install(&lua).unwrap();
        context.attach(lua.clone());

        Self {
            lua,
            diagnostics,
            services,
            env,
            context,
            dir,
        }
    }

    pub fn set_global(&self, name: &str, value: impl IntoLua) {
        self.lua.globals().set(name, value).unwrap();
    }
}
