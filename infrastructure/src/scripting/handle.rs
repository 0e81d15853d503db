//! Script-side wrapper for native handles.
//!
//! A [`ScriptHandle`] is the only shape in which a native object reaches Lua.
//! Member lookups go through the [`TypeBinding`](super::bindings::TypeBinding)
//! registered for the wrapped type; every access resolves the handle first,
//! so an expired weak handle raises "`<Type>` no longer exists" instead of
//! touching freed memory.
//!
//! Value types (hit props, drag) are carried by owning handles that are
//! cloned whenever they cross into native code.

use mlua::prelude::*;
use tactica_domain::{DomainError, Handle, MemberAccess, NativeType, Ownership};

use super::bindings::{Member, TypeBinding};
use super::environment::services;
use super::guards::{unknown_read, unknown_write};

pub struct ScriptHandle<T: NativeType> {
    handle: Handle<T>,
}

impl<T: NativeType> ScriptHandle<T> {
    pub fn new(handle: Handle<T>) -> Self {
        Self { handle }
    }

    /// Owning handle around a fresh value.
    pub fn owning(value: T) -> Self {
        Self::new(Handle::owning(value))
    }

    pub fn handle(&self) -> &Handle<T> {
        &self.handle
    }

    /// Drop ownership, leaving a weak observer.
    pub fn release(&mut self) {
        self.handle.release();
    }
}

/// Binding table for `T`, if one was registered.
fn binding<T: NativeType>(lua: &Lua) -> LuaResult<Option<std::sync::Arc<TypeBinding<T>>>> {
    Ok(services(lua)?.bindings.type_binding::<T>())
}

fn key_name(key: &LuaValue) -> Option<String> {
    match key {
        LuaValue::String(s) => s.to_str().ok().map(|s| s.to_string()),
        _ => None,
    }
}

fn index<T: NativeType>(lua: &Lua, this: &ScriptHandle<T>, key: LuaValue) -> LuaResult<LuaValue> {
    let Some(binding) = binding::<T>(lua)? else {
        return Ok(unknown_read(lua, T::TYPE_NAME, &key));
    };
    let Some(name) = key_name(&key) else {
        return Ok(unknown_read(lua, T::TYPE_NAME, &key));
    };

    match binding.member(&name) {
        Some(Member::Property { get, .. }) => this
            .handle
            .with(|target| get(lua, target))
            .map_err(LuaError::external)?,
        Some(Member::Method) => binding.method_function(lua, &name).map(LuaValue::Function),
        None => Ok(unknown_read(lua, T::TYPE_NAME, &key)),
    }
}

fn new_index<T: NativeType>(
    lua: &Lua,
    this: &ScriptHandle<T>,
    key: LuaValue,
    value: LuaValue,
) -> LuaResult<()> {
    let bound = binding::<T>(lua)?;
    let member = match (&bound, key_name(&key)) {
        (Some(bound), Some(name)) => bound.member(&name),
        _ => None,
    };

    match member {
        Some(Member::Property { set: Some(set), .. }) => this
            .handle
            .with_mut(|target| set(lua, target, value))
            .map_err(LuaError::external)?,
        Some(_) => {
            unknown_write(lua, T::TYPE_NAME, &key, MemberAccess::ReadOnlyWrite);
            Ok(())
        }
        None => {
            unknown_write(lua, T::TYPE_NAME, &key, MemberAccess::Write);
            Ok(())
        }
    }
}

impl<T: NativeType> LuaUserData for ScriptHandle<T> {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(LuaMetaMethod::Index, |lua, this, key: LuaValue| {
            index(lua, this, key)
        });
        methods.add_meta_method(
            LuaMetaMethod::NewIndex,
            |lua, this, (key, value): (LuaValue, LuaValue)| new_index(lua, this, key, value),
        );
        // Handles of different bound types are never equal.
        methods.add_meta_method(LuaMetaMethod::Eq, |_, this, other: LuaAnyUserData| {
            Ok(other
                .borrow::<Self>()
                .is_ok_and(|other| this.handle.ptr_eq(&other.handle)))
        });
        methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
            let state = if this.handle.is_expired() {
                "expired"
            } else {
                match this.handle.ownership() {
                    Ownership::Shared => "owned",
                    Ownership::Weak => "weak",
                }
            };
            Ok(format!("{} ({})", T::TYPE_NAME, state))
        });
    }
}

/// Borrow the handle out of a userdata argument.
pub fn handle_arg<T: NativeType>(value: &LuaValue) -> LuaResult<Handle<T>> {
    match value {
        LuaValue::UserData(ud) => ud
            .borrow::<ScriptHandle<T>>()
            .map(|h| h.handle.clone())
            .map_err(|_| expected::<T>(value)),
        other => Err(expected::<T>(other)),
    }
}

/// Copy a value type out of a userdata argument.
pub fn value_arg<T: NativeType + Clone>(value: &LuaValue) -> LuaResult<T> {
    handle_arg::<T>(value)?
        .with(T::clone)
        .map_err(LuaError::external)
}

fn expected<T: NativeType>(got: &LuaValue) -> LuaError {
    LuaError::external(format!(
        "expected {}, got {}",
        T::TYPE_NAME,
        got.type_name()
    ))
}

/// Convert an integer argument into one of the script enums.
pub fn enum_arg<E>(value: i64) -> LuaResult<E>
where
    E: TryFrom<i64, Error = DomainError>,
{
    E::try_from(value).map_err(LuaError::external)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::test_support::TestEnvironment;
    use tactica_domain::{Entity, Field, HitProps, Rank, Team, share};

    #[test]
    fn test_weak_handle_reports_expired_from_lua() {
        let env = TestEnvironment::new();
        let entity = share(Entity::character("com.test.hero", Team::Red, Rank::V1));
        env.set_global("hero", ScriptHandle::new(Handle::wrap(&entity)));

        let name: String = env.lua.load("return hero:get_name()").eval().unwrap();
        assert_eq!(name, "hero");

        drop(entity);
        let message: String = env
            .lua
            .load(
                r#"
                local ok, err = pcall(function() return hero:get_name() end)
                assert(not ok)
                return tostring(err)
            "#,
            )
            .eval()
            .unwrap();
        assert!(message.contains("Entity no longer exists"), "{}", message);

        let text: String = env.lua.load("return tostring(hero)").eval().unwrap();
        assert_eq!(text, "Entity (expired)");
    }

    #[test]
    fn test_thousands_of_expired_handles_from_lua() {
        let env = TestEnvironment::new();
        let owners: Vec<_> = (0..3000)
            .map(|_| share(Entity::spell(Team::Red)))
            .collect();
        let handles = env.lua.create_table().unwrap();
        for (i, owner) in owners.iter().enumerate() {
            handles
                .raw_set(i + 1, ScriptHandle::new(Handle::wrap(owner)))
                .unwrap();
        }
        env.set_global("handles", handles);

        let alive: i64 = env
            .lua
            .load(
                r#"
                local n = 0
                for _, h in ipairs(handles) do
                    if pcall(h.get_health, h) then n = n + 1 end
                end
                return n
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(alive, 3000);

        drop(owners);
        let expired: i64 = env
            .lua
            .load(
                r#"
                local n = 0
                for _, h in ipairs(handles) do
                    local ok, err = pcall(h.set_health, h, 10)
                    if not ok and string.find(tostring(err), "no longer exists", 1, true) then
                        n = n + 1
                    end
                end
                return n
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(expired, 3000);
    }

    #[test]
    fn test_unknown_members_are_guarded() {
        let env = TestEnvironment::new();
        let entity = share(Entity::character("com.test.hero", Team::Red, Rank::V1));
        env.set_global("hero", ScriptHandle::new(Handle::wrap(&entity)));

        let value: LuaValue = env
            .lua
            .load("hero.xyz = 5\nreturn hero.xyz")
            .set_name("@hero.lua")
            .eval()
            .unwrap();
        assert_eq!(value, LuaValue::Nil);

        let diagnostics = env.diagnostics.snapshot();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(
            diagnostics[0].message,
            "Attempted to assign to \"xyz\" in type \"Entity\""
        );
        assert_eq!(
            diagnostics[0].location.as_ref().unwrap().to_string(),
            "hero.lua:1"
        );
        assert_eq!(
            diagnostics[1].message,
            "Attempted to access \"xyz\" in type \"Entity\""
        );
        assert_eq!(
            diagnostics[1].location.as_ref().unwrap().to_string(),
            "hero.lua:2"
        );
    }

    #[test]
    fn test_method_assignment_is_read_only() {
        let env = TestEnvironment::new();
        let entity = share(Entity::character("com.test.hero", Team::Red, Rank::V1));
        env.set_global("hero", ScriptHandle::new(Handle::wrap(&entity)));

        env.lua.load("hero.get_name = 1").exec().unwrap();
        let diagnostics = env.diagnostics.snapshot();
        assert!(diagnostics[0].message.ends_with("\"get_name\" is read-only"));
    }

    #[test]
    fn test_equality_compares_targets() {
        let env = TestEnvironment::new();
        let entity = share(Entity::spell(Team::Red));
        env.set_global("a", ScriptHandle::new(Handle::wrap(&entity)));
        env.set_global("b", ScriptHandle::new(Handle::wrap(&entity)));
        env.set_global("c", ScriptHandle::owning(Entity::spell(Team::Red)));

        let (same, different): (bool, bool) = env.lua.load("return a == b, a == c").eval().unwrap();
        assert!(same);
        assert!(!different);
    }

    #[test]
    fn test_equality_across_types_is_false() {
        let env = TestEnvironment::new();
        let entity = share(Entity::spell(Team::Red));
        env.set_global("spell", ScriptHandle::new(Handle::wrap(&entity)));
        env.set_global("field", ScriptHandle::owning(Field::default()));

        let (equal, unequal): (bool, bool) = env
            .lua
            .load("return spell == field, spell ~= field")
            .eval()
            .unwrap();
        assert!(!equal);
        assert!(unequal);
    }

    #[test]
    fn test_value_arg_copies() {
        let env = TestEnvironment::new();
        let value = env
            .lua
            .create_userdata(ScriptHandle::owning(HitProps::default()))
            .map(LuaValue::UserData)
            .unwrap();
        let mut copy: HitProps = value_arg(&value).unwrap();
        copy.damage = 99;
        let original: HitProps = value_arg(&value).unwrap();
        assert_eq!(original.damage, 0);

        let err = handle_arg::<Entity>(&value).unwrap_err();
        assert!(err.to_string().contains("expected Entity"));
    }
}
