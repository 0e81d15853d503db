//! Callback bridge: script functions invoked on native events.
//!
//! Native objects only remember a [`CallbackId`]. The function itself lives
//! in a slot here as a `LuaRegistryKey`, together with the environment it
//! belongs to and, optionally, the native object that owns it. Events fire
//! in the order they are handed to [`CallbackBridge::dispatch`]; an event
//! whose slot, owner or environment is gone is skipped, never dereferenced.
//!
//! A callback that raises is reported through the diagnostic sink and the
//! pass continues with the next event.

use mlua::prelude::*;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tactica_application::{DiagnosticSink, DispatchReport};
use tactica_domain::{
    CallbackId, DiagnosticKind, EventArg, FireMode, Handle, NativeEvent, NativeType,
    ScriptDiagnostic,
};

use super::context::ScriptContext;
use super::environment::environment;
use super::guards::{describe_lua_error, split_location};
use super::handle::ScriptHandle;

/// Native object a slot belongs to; the slot is dead once it is dropped.
pub type SlotOwner = Weak<dyn Any + Send + Sync>;

struct CallbackSlot {
    key: LuaRegistryKey,
    context: Weak<ScriptContext>,
    mode: FireMode,
    armed: bool,
    owner: Option<SlotOwner>,
    /// Environment label, for diagnostics.
    label: String,
}

impl CallbackSlot {
    fn owner_alive(&self) -> bool {
        self.owner
            .as_ref()
            .is_none_or(|owner| owner.strong_count() > 0)
    }
}

/// Weak owner reference for the object behind `handle`.
pub fn owner_of<T: NativeType>(handle: &Handle<T>) -> LuaResult<SlotOwner> {
    let target: Arc<dyn Any + Send + Sync> = handle.unwrap().map_err(LuaError::external)?;
    Ok(Arc::downgrade(&target))
}

pub struct CallbackBridge {
    slots: Mutex<BTreeMap<CallbackId, CallbackSlot>>,
    next_id: AtomicU64,
}

impl CallbackBridge {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn slots(&self) -> MutexGuard<'_, BTreeMap<CallbackId, CallbackSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `function` in a new slot bound to the environment of `lua`.
    pub fn register(
        &self,
        lua: &Lua,
        function: LuaFunction,
        mode: FireMode,
        owner: Option<SlotOwner>,
    ) -> LuaResult<CallbackId> {
        let env = environment(lua)?;
        let key = lua.create_registry_value(function)?;
        let id = CallbackId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.slots().insert(
            id,
            CallbackSlot {
                key,
                context: env.context.clone(),
                mode,
                armed: true,
                owner,
                label: env.label.clone(),
            },
        );
        tracing::trace!(callback = %id, module = %env.label, "Callback registered");
        Ok(id)
    }

    /// Drop the slots behind `ids`. Unknown ids are ignored.
    pub fn release(&self, ids: &[CallbackId]) {
        if ids.is_empty() {
            return;
        }
        let mut slots = self.slots();
        for id in ids {
            slots.remove(id);
        }
    }

    /// Drop every slot, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut slots = self.slots();
        let count = slots.len();
        slots.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_armed(&self, id: CallbackId) -> bool {
        self.slots().get(&id).is_some_and(|slot| slot.armed)
    }

    /// Fire the callbacks for `events` in order.
    pub fn dispatch(&self, events: Vec<NativeEvent>, sink: &dyn DiagnosticSink) -> DispatchReport {
        let mut report = DispatchReport::default();
        for event in events {
            // The slot lock is released before the script runs, so callbacks
            // may register or release slots themselves.
            let Some((lua, function, label)) = self.prepare(&event) else {
                tracing::trace!(callback = %event.callback, kind = %event.kind, "Callback skipped");
                report.skipped += 1;
                continue;
            };

            match invoke(&lua, &function, &event) {
                Ok(()) => report.fired += 1,
                Err(error) => {
                    let message = describe_lua_error(&error);
                    let (location, text) = split_location(&message);
                    let diagnostic = ScriptDiagnostic::new(DiagnosticKind::Callback, text)
                        .at(location)
                        .with_context(format!(
                            "{} slot {} in {}",
                            event.kind.as_str(),
                            event.callback,
                            label
                        ));
                    sink.report(&diagnostic);
                    report.failures.push(diagnostic);
                }
            }
        }
        report
    }

    /// Resolve the slot for `event`, disarming one-shot slots.
    fn prepare(&self, event: &NativeEvent) -> Option<(Lua, LuaFunction, String)> {
        let mut slots = self.slots();
        let slot = slots.get_mut(&event.callback)?;
        if !slot.armed || !slot.owner_alive() {
            return None;
        }
        let lua = slot.context.upgrade()?.lua().ok()?;
        let function: LuaFunction = lua.registry_value(&slot.key).ok()?;
        if slot.mode == FireMode::OneShot {
            slot.armed = false;
        }
        Some((lua, function, slot.label.clone()))
    }
}

impl Default for CallbackBridge {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke(lua: &Lua, function: &LuaFunction, event: &NativeEvent) -> LuaResult<()> {
    let mut args = Vec::with_capacity(event.args.len());
    for arg in &event.args {
        args.push(match arg {
            EventArg::Entity(handle) => {
                LuaValue::UserData(lua.create_userdata(ScriptHandle::new(handle.downgrade()))?)
            }
            EventArg::Integer(value) => LuaValue::Integer(*value),
        });
    }
    function.call::<()>(LuaMultiValue::from_iter(args))
}
