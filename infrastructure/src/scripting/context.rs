//! Execution contexts: one Lua state per loaded module.
//!
//! The [`ExecutionContextManager`] owns every state. Everything else (the
//! callback bridge, loaded modules) refers to a context weakly, so once the
//! manager shuts down no script can run again, even through a slot that
//! was registered long before.

use mlua::Lua;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tactica_application::RuntimeError;

/// Lua state of one module.
#[derive(Debug)]
pub struct ScriptContext {
    label: String,
    lua: Mutex<Option<Lua>>,
}

impl ScriptContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            lua: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Lua>> {
        self.lua.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn attach(&self, lua: Lua) {
        *self.slot() = Some(lua);
    }

    /// The module's state, or `ShutDown` once the context was closed.
    pub fn lua(&self) -> Result<Lua, RuntimeError> {
        self.slot().clone().ok_or(RuntimeError::ShutDown)
    }

    pub fn is_closed(&self) -> bool {
        self.slot().is_none()
    }

    /// Drop the state. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let lua = self.slot().take();
        lua.is_some()
    }
}

/// Owner of every module context.
#[derive(Default)]
pub struct ExecutionContextManager {
    contexts: Mutex<BTreeMap<PathBuf, Arc<ScriptContext>>>,
    shut_down: AtomicBool,
}

impl ExecutionContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn contexts(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Arc<ScriptContext>>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the context for the module at `entry`.
    pub fn create(&self, entry: &Path) -> Result<Arc<ScriptContext>, RuntimeError> {
        if self.is_shut_down() {
            return Err(RuntimeError::ShutDown);
        }
        let context = Arc::new(ScriptContext::new(entry.display().to_string()));
        self.contexts()
            .insert(entry.to_path_buf(), Arc::clone(&context));
        Ok(context)
    }

    pub fn get(&self, entry: &Path) -> Option<Arc<ScriptContext>> {
        self.contexts().get(entry).cloned()
    }

    pub fn len(&self) -> usize {
        self.contexts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Tear down every context. Only the first call does any work; it
    /// returns the number of states that were closed.
    pub fn shutdown(&self) -> usize {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let contexts = std::mem::take(&mut *self.contexts());
        let closed = contexts.values().filter(|c| c.close()).count();
        tracing::debug!(closed, "Script contexts torn down");
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_context_reports_shutdown() {
        let context = ScriptContext::new("mods/enemies/hero/entry.lua");
        assert_eq!(context.lua().unwrap_err(), RuntimeError::ShutDown);

        context.attach(Lua::new());
        let lua = context.lua().unwrap();
        let two: i64 = lua.load("1 + 1").eval().unwrap();
        assert_eq!(two, 2);

        assert!(context.close());
        assert!(!context.close());
        assert!(context.is_closed());
        assert_eq!(context.label(), "mods/enemies/hero/entry.lua");
    }

    #[test]
    fn test_shutdown_runs_once() {
        let manager = ExecutionContextManager::new();
        let hero = manager.create(Path::new("/mods/hero/entry.lua")).unwrap();
        hero.attach(Lua::new());
        let lib = manager.create(Path::new("/mods/lib/entry.lua")).unwrap();
        lib.attach(Lua::new());
        assert_eq!(manager.len(), 2);
        assert!(manager.get(Path::new("/mods/hero/entry.lua")).is_some());

        assert_eq!(manager.shutdown(), 2);
        assert_eq!(manager.shutdown(), 0);
        assert!(manager.is_empty());
        assert!(hero.is_closed());
        assert_eq!(
            manager.create(Path::new("/mods/late/entry.lua")).unwrap_err(),
            RuntimeError::ShutDown
        );
    }
}
