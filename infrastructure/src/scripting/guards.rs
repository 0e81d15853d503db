//! Guarded member access for bound types, namespaces and enum tables.
//!
//! Reading an undeclared member yields `nil`; writing one is ignored. Both
//! report an access diagnostic naming the type, the member and the script
//! location, so a typo in content never takes the host down.

use mlua::prelude::*;
use tactica_domain::{MemberAccess, ScriptDiagnostic, SourceLocation};

use super::environment::{environment, services};
use super::sandbox::display_value;

/// `file:line` of the Lua code that called into the current native function.
pub fn current_location(lua: &Lua) -> Option<SourceLocation> {
    // Level 0 is the native function itself.
    let frame = lua.inspect_stack(1)?;
    let source = frame.source();
    let file = source
        .source
        .as_deref()
        .and_then(|s| s.strip_prefix('@'))
        .map(str::to_string)
        .or_else(|| source.short_src.as_deref().map(str::to_string))?;
    let line = u32::try_from(frame.curr_line()).ok();
    Some(SourceLocation::new(file, line))
}

/// Send a diagnostic raised by script code to the runtime's sink.
///
/// The location is filled in from the call stack and the module label is
/// attached as context when the diagnostic does not carry one already.
pub fn report(lua: &Lua, diagnostic: ScriptDiagnostic) {
    let mut diagnostic = if diagnostic.location.is_some() {
        diagnostic
    } else {
        let location = current_location(lua);
        diagnostic.at(location)
    };
    if diagnostic.context.is_none()
        && let Ok(env) = environment(lua)
    {
        diagnostic = diagnostic.with_context(env.label.clone());
    }

    match services(lua) {
        Ok(services) => services.report(&diagnostic),
        Err(_) => tracing::warn!("{}", diagnostic),
    }
}

/// Report an unknown read and produce the value scripts see instead.
pub fn unknown_read(lua: &Lua, type_name: &str, key: &LuaValue) -> LuaValue {
    report(
        lua,
        ScriptDiagnostic::member_access(type_name, &display_value(key), MemberAccess::Read),
    );
    LuaValue::Nil
}

pub fn unknown_write(lua: &Lua, type_name: &str, key: &LuaValue, access: MemberAccess) {
    report(
        lua,
        ScriptDiagnostic::member_access(type_name, &display_value(key), access),
    );
}

/// Guard a plain table (namespace or type table): unknown reads and every
/// write of a new key are reported.
///
/// Members must be set before the guard is installed.
pub fn guard_table(lua: &Lua, table: &LuaTable, type_name: &str) -> LuaResult<()> {
    let meta = lua.create_table()?;

    let name = type_name.to_string();
    meta.raw_set(
        "__index",
        lua.create_function(move |lua, (_table, key): (LuaTable, LuaValue)| {
            Ok(unknown_read(lua, &name, &key))
        })?,
    )?;

    let name = type_name.to_string();
    meta.raw_set(
        "__newindex",
        lua.create_function(
            move |lua, (_table, key, _value): (LuaTable, LuaValue, LuaValue)| {
                unknown_write(lua, &name, &key, MemberAccess::Write);
                Ok(())
            },
        )?,
    )?;

    meta.raw_set("__metatable", false)?;
    table.set_metatable(Some(meta));
    Ok(())
}

/// Build a read-only view over `entries` (used for enum tables).
///
/// Known keys read through; assigning to one is reported as read-only and
/// assigning to an unknown key as an unknown write.
pub fn read_only_table(lua: &Lua, entries: LuaTable, type_name: &str) -> LuaResult<LuaTable> {
    let proxy = lua.create_table()?;
    let meta = lua.create_table()?;

    let name = type_name.to_string();
    let readable = entries.clone();
    meta.raw_set(
        "__index",
        lua.create_function(move |lua, (_table, key): (LuaTable, LuaValue)| {
            match readable.raw_get::<LuaValue>(key.clone())? {
                LuaValue::Nil => Ok(unknown_read(lua, &name, &key)),
                value => Ok(value),
            }
        })?,
    )?;

    let name = type_name.to_string();
    let writable = entries.clone();
    meta.raw_set(
        "__newindex",
        lua.create_function(
            move |lua, (_table, key, _value): (LuaTable, LuaValue, LuaValue)| {
                let access = if writable.raw_get::<LuaValue>(key.clone())?.is_nil() {
                    MemberAccess::Write
                } else {
                    MemberAccess::ReadOnlyWrite
                };
                unknown_write(lua, &name, &key, access);
                Ok(())
            },
        )?,
    )?;

    meta.raw_set("__pairs", lua.create_function(move |lua, _: LuaTable| {
        let next: LuaFunction = lua.globals().raw_get("next")?;
        Ok((next, entries.clone(), LuaValue::Nil))
    })?)?;
    meta.raw_set("__metatable", false)?;
    proxy.set_metatable(Some(meta));
    Ok(proxy)
}

/// Plain-text reason for a Lua error, without mlua's wrapping or tracebacks.
pub fn describe_lua_error(error: &LuaError) -> String {
    match error {
        LuaError::CallbackError { cause, .. } => describe_lua_error(cause),
        LuaError::WithContext { context, cause } => {
            format!("{}: {}", context, describe_lua_error(cause))
        }
        LuaError::RuntimeError(message) => strip_traceback(message).to_string(),
        LuaError::SyntaxError { message, .. } => strip_traceback(message).to_string(),
        LuaError::ExternalError(inner) => inner.to_string(),
        other => other.to_string(),
    }
}

fn strip_traceback(message: &str) -> &str {
    message
        .split_once("\nstack traceback:")
        .map_or(message, |(head, _)| head)
        .trim_end()
}

/// Split a Lua error message of the form `file:line: message` into its parts.
pub fn split_location(message: &str) -> (Option<SourceLocation>, &str) {
    let mut parts = message.splitn(3, ':');
    let (Some(file), Some(line), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
        return (None, message);
    };
    match line.trim().parse::<u32>() {
        Ok(line) if !file.is_empty() => (
            Some(SourceLocation::new(file.trim(), Some(line))),
            rest.trim_start(),
        ),
        _ => (None, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::test_support::TestEnvironment;

    #[test]
    fn test_current_location_points_at_caller() {
        let env = TestEnvironment::new();
        let where_am_i = env
            .lua
            .create_function(|lua, ()| {
                let location = current_location(lua).unwrap();
                Ok((location.file, location.line.unwrap_or(0)))
            })
            .unwrap();
        env.lua.globals().set("where_am_i", where_am_i).unwrap();

        let (file, line): (String, u32) = env
            .lua
            .load("local file, line = where_am_i()\nreturn file, line")
            .set_name("@mods/test/entry.lua")
            .eval()
            .unwrap();
        assert_eq!(file, "mods/test/entry.lua");
        assert_eq!(line, 1);
    }

    #[test]
    fn test_guarded_table_reports_unknown_members() {
        let env = TestEnvironment::new();
        let table = env.lua.create_table().unwrap();
        table.raw_set("known", 1).unwrap();
        guard_table(&env.lua, &table, "Battle.Thing").unwrap();
        env.lua.globals().set("Thing", table).unwrap();

        let value: LuaValue = env
            .lua
            .load("Thing.known = 2\nreturn Thing.xyz")
            .set_name("@thing.lua")
            .eval()
            .unwrap();
        assert_eq!(value, LuaValue::Nil);

        // Assigning an existing key is a plain raw write
        let known: i64 = env.lua.load("return Thing.known").eval().unwrap();
        assert_eq!(known, 2);

        env.lua.load("Thing.abc = 5").set_name("@thing.lua").exec().unwrap();
        let diagnostics = env.diagnostics.snapshot();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(
            diagnostics[0].message,
            "Attempted to access \"xyz\" in type \"Battle.Thing\""
        );
        assert_eq!(diagnostics[0].location.as_ref().unwrap().to_string(), "thing.lua:2");
        assert_eq!(
            diagnostics[1].message,
            "Attempted to assign to \"abc\" in type \"Battle.Thing\""
        );
    }

    #[test]
    fn test_read_only_table() {
        let env = TestEnvironment::new();
        let entries = env.lua.create_table().unwrap();
        entries.raw_set("Red", 0).unwrap();
        entries.raw_set("Blue", 1).unwrap();
        let proxy = read_only_table(&env.lua, entries, "Team").unwrap();
        env.lua.globals().set("Team", proxy).unwrap();

        let blue: i64 = env.lua.load("return Team.Blue").eval().unwrap();
        assert_eq!(blue, 1);

        env.lua.load("Team.Blue = 7; Team.Green = 2").exec().unwrap();
        let blue: i64 = env.lua.load("return Team.Blue").eval().unwrap();
        assert_eq!(blue, 1);

        let count: i64 = env
            .lua
            .load("local n = 0 for _ in pairs(Team) do n = n + 1 end return n")
            .eval()
            .unwrap();
        assert_eq!(count, 2);

        let messages: Vec<_> = env
            .diagnostics
            .snapshot()
            .into_iter()
            .map(|d| d.message)
            .collect();
        assert_eq!(
            messages,
            vec![
                "Attempted to assign to \"Blue\" in type \"Team\": \"Blue\" is read-only",
                "Attempted to assign to \"Green\" in type \"Team\"",
            ]
        );
    }

    #[test]
    fn test_describe_lua_error_unwraps_callbacks() {
        let lua = Lua::new();
        let fail = lua
            .create_function(|_, ()| -> LuaResult<()> { Err(LuaError::external("boom")) })
            .unwrap();
        let err = fail.call::<()>(()).unwrap_err();
        assert_eq!(describe_lua_error(&err), "boom");

        let err = lua.load("error('plain')").exec().unwrap_err();
        let message = describe_lua_error(&err);
        assert!(message.ends_with("plain"), "{}", message);
        assert!(!message.contains("stack traceback"));
    }

    #[test]
    fn test_split_location() {
        let (location, rest) = split_location("mods/a/entry.lua:12: attempt to call nil");
        assert_eq!(location.unwrap().to_string(), "mods/a/entry.lua:12");
        assert_eq!(rest, "attempt to call nil");

        let (location, rest) = split_location("no location here");
        assert!(location.is_none());
        assert_eq!(rest, "no location here");
    }
}
