//! Module loader and dependency resolver.
//!
//! A module is a package directory with an entry file. Loading one:
//!
//! 1. canonicalizes the entry path; each path loads at most once and the
//!    outcome (success or failure) is cached
//! 2. builds a sandboxed environment with every binding installed and
//!    `_modpath` set
//! 3. runs the entry chunk, then `package_init(meta)` if the chunk defined it
//! 4. commits the dependency notes left by shared-library includes to the
//!    package graph, rejecting cycles, and removes the scratch table
//!
//! Characters and libraries are registered by fully-qualified name.
//! Characters load on first demand; libraries are pulled into the includer's
//! environment by `include(name)`.

use mlua::prelude::*;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tactica_application::RuntimeError;
use tactica_domain::{
    DependencyGraph, DiagnosticKind, FqnRegistry, Handle, ModuleClass, ModuleState, PackageKind,
    PackageMeta, PackageSummary, ScriptDiagnostic,
};
use tracing::{debug, warn};

use super::bindings::{BindingError, BindingRegistry};
use super::context::{ExecutionContextManager, ScriptContext};
use super::environment::{EnvironmentState, RuntimeServices, environment};
use super::guards::{describe_lua_error, split_location};
use super::handle::ScriptHandle;
use super::sandbox;

/// Scratch table collecting shared-library includes during a load.
const DEPENDENCY_NOTES: &str = "__dependencies";
/// Named registry table caching include results per environment.
const INCLUDE_CACHE: &str = "tactica.includes";

/// A module whose load finished, successfully or not.
pub struct ScriptModule {
    env: Arc<EnvironmentState>,
    kind: PackageKind,
    outcome: Result<(), RuntimeError>,
    dependencies: Vec<String>,
}

impl ScriptModule {
    pub fn entry(&self) -> &Path {
        &self.env.entry
    }

    pub fn dir(&self) -> &Path {
        &self.env.dir
    }

    pub fn kind(&self) -> PackageKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.env.label
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn is_loaded(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The cached load outcome.
    pub fn result(&self) -> Result<(), RuntimeError> {
        self.outcome.clone()
    }

    pub fn environment(&self) -> &Arc<EnvironmentState> {
        &self.env
    }

    pub fn context(&self) -> Option<Arc<ScriptContext>> {
        self.env.context.upgrade()
    }

    /// The module's Lua state, or `ShutDown` once its context is gone.
    pub fn lua(&self) -> Result<Lua, RuntimeError> {
        self.context().ok_or(RuntimeError::ShutDown)?.lua()
    }

    pub fn summary(&self) -> PackageSummary {
        let meta = self.env.meta.lock().unwrap_or_else(PoisonError::into_inner);
        PackageSummary {
            id: meta.package_id().cloned(),
            kind: self.kind,
            path: self.env.dir.clone(),
            name: meta.name().to_string(),
            description: meta.description().to_string(),
            dependencies: self.dependencies.clone(),
        }
    }
}

struct LoaderState {
    modules: HashMap<PathBuf, Arc<ScriptModule>>,
    states: HashMap<PathBuf, ModuleState>,
    characters: FqnRegistry,
    libraries: FqnRegistry,
    graph: DependencyGraph,
}

impl Default for LoaderState {
    fn default() -> Self {
        Self {
            modules: HashMap::new(),
            states: HashMap::new(),
            characters: FqnRegistry::new(ModuleClass::Character),
            libraries: FqnRegistry::new(ModuleClass::Library),
            graph: DependencyGraph::new(),
        }
    }
}

/// Loader state shared by every environment of one runtime.
///
/// The state lock is never held while a script runs: a chunk may call back
/// into the loader (`Engine.requires_character`, `include`).
pub struct RuntimeShared {
    services: Arc<RuntimeServices>,
    contexts: ExecutionContextManager,
    state: Mutex<LoaderState>,
}

impl RuntimeShared {
    pub fn new(services: Arc<RuntimeServices>) -> Arc<Self> {
        Arc::new(Self {
            services,
            contexts: ExecutionContextManager::new(),
            state: Mutex::new(LoaderState::default()),
        })
    }

    pub fn services(&self) -> &Arc<RuntimeServices> {
        &self.services
    }

    pub fn contexts(&self) -> &ExecutionContextManager {
        &self.contexts
    }

    fn state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_running(&self) -> Result<(), RuntimeError> {
        if self.contexts.is_shut_down() {
            Err(RuntimeError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Load the package in `dir`, or return the cached module.
    pub fn load_module(
        self: &Arc<Self>,
        dir: &Path,
        kind: PackageKind,
    ) -> Result<Arc<ScriptModule>, RuntimeError> {
        self.ensure_running()?;
        let entry_path = self.services.settings.entry_path(dir);
        let entry = entry_path
            .canonicalize()
            .map_err(|_| RuntimeError::ModuleNotFound { path: entry_path })?;

        {
            let mut state = self.state();
            if let Some(module) = state.modules.get(&entry) {
                return Ok(Arc::clone(module));
            }
            if !state.states.entry(entry.clone()).or_default().begin() {
                return Err(RuntimeError::CircularLoad { path: entry });
            }
        }

        debug!(entry = %entry.display(), kind = %kind, "Loading module");
        let (env, outcome) = self.execute(&entry, kind);
        let mut state = self.state();
        let outcome = outcome.and_then(|notes| {
            let id = env
                .meta
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .package_id()
                .cloned();
            match id {
                Some(id) => Ok(state.graph.register(&id, notes)?.to_vec()),
                None => {
                    if !notes.is_empty() {
                        debug!(entry = %entry.display(), "Dependencies dropped: no package id declared");
                    }
                    Ok(Vec::new())
                }
            }
        });

        let (outcome, dependencies) = match outcome {
            Ok(dependencies) => (Ok(()), dependencies),
            Err(error) => (Err(error), Vec::new()),
        };
        if let Some(module_state) = state.states.get_mut(&entry) {
            module_state.finish(outcome.clone().map_err(|e| e.reason()));
        }
        let module = Arc::new(ScriptModule {
            env,
            kind,
            outcome,
            dependencies,
        });
        state.modules.insert(entry, Arc::clone(&module));
        drop(state);

        if let Err(error) = &module.outcome {
            warn!(entry = %module.label(), "Module failed to load: {}", error);
            let reason = error.reason();
            let (location, _) = split_location(&reason);
            self.services.report(
                &ScriptDiagnostic::new(DiagnosticKind::Load, error.to_string())
                    .at(location)
                    .with_context(module.label()),
            );
        }
        Ok(module)
    }

    /// Build the environment for `entry` and run it. Returns the dependency notes.
    fn execute(
        self: &Arc<Self>,
        entry: &Path,
        kind: PackageKind,
    ) -> (Arc<EnvironmentState>, Result<Vec<String>, RuntimeError>) {
        let dir = entry.parent().unwrap_or(entry);
        let context = self.contexts.create(entry);
        let weak_context = context
            .as_ref()
            .map(Arc::downgrade)
            .unwrap_or_default();
        let env = Arc::new(EnvironmentState::new(
            entry,
            dir,
            kind,
            weak_context,
            Arc::downgrade(self),
        ));

        let outcome = context.and_then(|context| {
            self.run_entry(&env, &context).map_err(|e| RuntimeError::LoadFailed {
                path: entry.to_path_buf(),
                reason: describe_lua_error(&e),
            })
        });
        (env, outcome)
    }

    fn run_entry(
        &self,
        env: &Arc<EnvironmentState>,
        context: &ScriptContext,
    ) -> LuaResult<Vec<String>> {
        let lua = sandbox::new_environment(&self.services.settings, &env.label)?;
        lua.set_app_data(Arc::clone(&self.services));
        lua.set_app_data(Arc::clone(env));
        self.services.bindings.install(&lua)?;
        lua.globals().raw_set("_modpath", env.modpath())?;
        context.attach(lua.clone());
        // Including the entry file from inside its own load is a no-op.
        include_cache(&lua)?.raw_set(cache_key(&env.entry), true)?;

        run_file(&lua, &env.entry)?;

        if let LuaValue::Function(init) = lua.globals().raw_get::<LuaValue>("package_init")? {
            init.call::<()>(ScriptHandle::new(Handle::wrap(&env.meta)))?;
        }
        take_dependency_notes(&lua)
    }

    /// Load `dir` and report its metadata, failing if the load failed.
    pub fn load_package(
        self: &Arc<Self>,
        dir: &Path,
        kind: PackageKind,
    ) -> Result<PackageSummary, RuntimeError> {
        let module = self.load_module(dir, kind)?;
        module.result()?;
        Ok(module.summary())
    }

    pub fn define_character(&self, fqn: &str, dir: &Path) -> Result<bool, RuntimeError> {
        self.ensure_running()?;
        let fresh = self.state().characters.define(fqn, dir);
        debug!(fqn, dir = %dir.display(), fresh, "Character defined");
        Ok(fresh)
    }

    /// Register a shared library. Its entry file must exist.
    pub fn define_library(&self, fqn: &str, dir: &Path) -> Result<bool, RuntimeError> {
        self.ensure_running()?;
        let entry = self.services.settings.entry_path(dir);
        if !entry.is_file() {
            return Err(RuntimeError::LibraryLoadFailed {
                fqn: fqn.to_string(),
                reason: RuntimeError::ModuleNotFound { path: entry }.to_string(),
            });
        }
        let fresh = self.state().libraries.define(fqn, dir);
        debug!(fqn, dir = %dir.display(), fresh, "Library defined");
        Ok(fresh)
    }

    /// Entry file of the shared library registered as `fqn`.
    pub fn library_path(&self, fqn: &str) -> Option<PathBuf> {
        let dir = self.state().libraries.get(fqn).map(Path::to_path_buf)?;
        Some(self.services.settings.entry_path(&dir))
    }

    pub fn character_dir(&self, fqn: &str) -> Option<PathBuf> {
        self.state().characters.get(fqn).map(Path::to_path_buf)
    }

    /// Load the character behind `fqn` if it is not loaded yet.
    ///
    /// Built-in characters are always satisfied. Any load failure names the
    /// FQN and the underlying reason.
    pub fn requires_character(self: &Arc<Self>, fqn: &str) -> Result<(), RuntimeError> {
        self.ensure_running()?;
        if self.services.settings.is_builtin_character(fqn) {
            return Ok(());
        }
        let dir = self
            .character_dir(fqn)
            .ok_or_else(|| RuntimeError::MissingCharacter {
                fqn: fqn.to_string(),
            })?;

        match self
            .load_module(&dir, PackageKind::Character)
            .and_then(|module| module.result())
        {
            Ok(()) => Ok(()),
            Err(RuntimeError::ShutDown) => Err(RuntimeError::ShutDown),
            Err(error) => Err(RuntimeError::CharacterLoadFailed {
                fqn: fqn.to_string(),
                reason: error.reason(),
            }),
        }
    }

    /// Loaded module of the character `fqn`.
    pub fn character_module(self: &Arc<Self>, fqn: &str) -> Result<Arc<ScriptModule>, RuntimeError> {
        self.requires_character(fqn)?;
        let dir = self
            .character_dir(fqn)
            .ok_or_else(|| RuntimeError::MissingCharacter {
                fqn: fqn.to_string(),
            })?;
        self.load_module(&dir, PackageKind::Character)
    }

    pub fn dependencies(&self) -> DependencyGraph {
        self.state().graph.clone()
    }

    pub fn module_count(&self) -> usize {
        self.state().modules.len()
    }

    /// Tear down every environment and forget every module.
    pub fn shutdown(&self) -> usize {
        let closed = self.contexts.shutdown();
        let released = self.services.bridge.clear();
        let mut state = self.state();
        state.modules.clear();
        state.states.clear();
        debug!(closed, released, "Script runtime shut down");
        closed
    }
}

/// Register the module-level globals: `include` and `declare_package_id`.
pub fn register_module_api(registry: &mut BindingRegistry) -> Result<(), BindingError> {
    registry.register_function("", "include", |lua, name: String| include(lua, &name))?;
    registry.register_function("", "declare_package_id", |lua, id: String| {
        let env = environment(lua)?;
        Handle::wrap(&env.meta)
            .with_mut(|meta| meta.declare_package_id(&id).map(|_| ()))
            .map_err(LuaError::external)?
            .map_err(LuaError::external)
    })?;
    Ok(())
}

fn include(lua: &Lua, name: &str) -> LuaResult<LuaValue> {
    let failed = |reason: String| {
        LuaError::runtime(format!("include(\"{}\") failed: {}", name, reason))
    };
    let env = environment(lua)?;
    let library = env
        .runtime
        .upgrade()
        .and_then(|runtime| runtime.library_path(name));

    let path = match &library {
        Some(path) => {
            // Libraries pulled in by a library belong to that library, not to this module.
            if !env.in_library() {
                note_dependency(lua, name)?;
            }
            path.clone()
        }
        None => local_path(&env.dir, name).map_err(failed)?,
    };

    let cache = include_cache(lua)?;
    let key = cache_key(&path);
    match cache.raw_get::<LuaValue>(key.as_str())? {
        LuaValue::Nil => {}
        LuaValue::Boolean(false) => return Err(failed("included recursively".to_string())),
        cached => return Ok(cached),
    }

    cache.raw_set(key.as_str(), false)?;
    let result = match library {
        Some(_) => run_library(lua, &env, &path),
        None => run_file(lua, &path),
    };

    match result {
        Ok(value) => {
            let value = if value.is_nil() {
                LuaValue::Boolean(true)
            } else {
                value
            };
            cache.raw_set(key.as_str(), value.clone())?;
            Ok(value)
        }
        Err(error) => {
            cache.raw_set(key.as_str(), LuaValue::Nil)?;
            Err(failed(describe_lua_error(&error)))
        }
    }
}

/// Run a shared library in the includer's environment.
///
/// Whatever the library declares about itself (`package_init`, package id, name)
/// is rolled back afterwards so the includer keeps its own identity.
fn run_library(lua: &Lua, env: &EnvironmentState, path: &Path) -> LuaResult<LuaValue> {
    let globals = lua.globals();
    let package_init = globals.raw_get::<LuaValue>("package_init")?;
    let identity = lock_meta(env).identity();

    env.enter_library();
    let result = run_file(lua, path);
    env.leave_library();

    lock_meta(env).restore_identity(identity);
    globals.raw_set("package_init", package_init)?;
    result
}

fn lock_meta(env: &EnvironmentState) -> MutexGuard<'_, PackageMeta> {
    env.meta.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolve a local include. It may not leave the module directory.
fn local_path(dir: &Path, name: &str) -> Result<PathBuf, String> {
    let relative = Path::new(name);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if name.is_empty() || escapes {
        return Err(format!("'{}' is outside the module directory", name));
    }
    Ok(dir.join(relative))
}

fn run_file(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| LuaError::runtime(format!("cannot read {}: {}", path.display(), e)))?;
    lua.load(source)
        .set_name(format!("@{}", path.display()))
        .call(())
}

fn cache_key(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

fn include_cache(lua: &Lua) -> LuaResult<LuaTable> {
    match lua.named_registry_value::<LuaValue>(INCLUDE_CACHE)? {
        LuaValue::Table(cache) => Ok(cache),
        _ => {
            let cache = lua.create_table()?;
            lua.set_named_registry_value(INCLUDE_CACHE, cache.clone())?;
            Ok(cache)
        }
    }
}

fn note_dependency(lua: &Lua, name: &str) -> LuaResult<()> {
    let globals = lua.globals();
    let notes = match globals.raw_get::<LuaValue>(DEPENDENCY_NOTES)? {
        LuaValue::Table(notes) => notes,
        _ => {
            let notes = lua.create_table()?;
            globals.raw_set(DEPENDENCY_NOTES, notes.clone())?;
            notes
        }
    };
    notes.raw_set(notes.raw_len() + 1, name)
}

/// Collect the dependency notes and remove the scratch table.
fn take_dependency_notes(lua: &Lua) -> LuaResult<Vec<String>> {
    let globals = lua.globals();
    let notes = match globals.raw_get::<LuaValue>(DEPENDENCY_NOTES)? {
        LuaValue::Table(notes) => notes
            .sequence_values::<String>()
            .collect::<LuaResult<Vec<_>>>()?,
        _ => Vec::new(),
    };
    globals.raw_set(DEPENDENCY_NOTES, LuaValue::Nil)?;
    Ok(notes)
}
