//! Lua mod runtime (feature-gated: `scripting`)
//!
//! Provides the `LuaScriptRuntime` that implements `ScriptRuntimePort`
//! from the application layer, backed by mlua (Lua 5.4).
//!
//! # Modules
//!
//! - `bindings`: Type/function/enum registry and the `Battle.*` / `Engine.*` tables
//! - `handle`: `ScriptHandle`, the userdata wrapping owning and weak native handles
//! - `guards`: Unknown-member diagnostics and read-only tables
//! - `callback_bridge`: Script functions fired by native events
//! - `context`: One Lua state per module, torn down at shutdown
//! - `environment`: Per-state app data shared by bindings
//! - `loader`: Module loading, `include`, character and library registries
//! - `sandbox`: Restricted standard library
//! - `runtime`: Main runtime struct tying everything together

pub mod bindings;
mod callback_bridge;
mod context;
mod environment;
mod guards;
mod handle;
mod loader;
mod runtime;
mod sandbox;

#[cfg(test)]
mod test_support;

pub use bindings::{BindingError, BindingRegistry, standard_registry};
pub use loader::ScriptModule;
pub use runtime::LuaScriptRuntime;
