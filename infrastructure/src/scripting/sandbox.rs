//! Lua sandbox: restricted standard library for package scripts.
//!
//! Package scripts come from third-party content, so an environment only gets
//! the base, `math` and `table` libraries (plus `string` when the config allows
//! it). Nothing that reaches the filesystem, the process or the debug API is
//! opened, and the base functions that load code from outside the module
//! loader are removed.

use mlua::prelude::*;
use mlua::{LuaOptions, StdLib};
use tactica_application::RuntimeSettings;

/// Base-library functions that load code behind the module loader's back.
const BLOCKED_GLOBALS: [&str; 4] = ["dofile", "loadfile", "load", "require"];

/// Create a Lua VM with the restricted library set.
pub fn new_environment(settings: &RuntimeSettings, label: &str) -> LuaResult<Lua> {
    let mut libs = StdLib::MATH | StdLib::TABLE;
    if settings.allow_string_lib {
        libs = libs | StdLib::STRING;
    }

    let lua = Lua::new_with(libs, LuaOptions::default())?;
    apply_sandbox(&lua, label)?;

    // Seeded so script-side randomness replays identically.
    lua.load(format!("math.randomseed({})", settings.rand_seed))
        .set_name("=sandbox")
        .exec()?;
    Ok(lua)
}

/// Apply sandbox restrictions to the Lua VM.
///
/// Currently:
/// - removes `dofile`, `loadfile`, `load` and `require`
/// - removes `string.dump` when the string library is open
/// - redirects `print` to the log, tagged with the module label
pub fn apply_sandbox(lua: &Lua, label: &str) -> LuaResult<()> {
    let globals = lua.globals();
    for name in BLOCKED_GLOBALS {
        globals.raw_set(name, LuaValue::Nil)?;
    }

    if let LuaValue::Table(string) = globals.raw_get::<LuaValue>("string")? {
        string.raw_set("dump", LuaValue::Nil)?;
    }

    let module = label.to_string();
    let print = lua.create_function(move |_, args: LuaMultiValue| {
        let line = args
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join("\t");
        tracing::info!(module = %module, "{}", line);
        Ok(())
    })?;
    globals.raw_set("print", print)?;
    Ok(())
}

/// Render a Lua value for logs and diagnostics without calling back into Lua.
pub fn display_value(value: &LuaValue) -> String {
    match value {
        LuaValue::Nil => "nil".to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(n) => n.to_string(),
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        other => other.type_name().to_string(),
    }
}
