//! Read-only enum tables: `Team`, `Element`, `Direction`, `Hit`, `Input.Pressed`, ...

use super::{BindingError, BindingRegistry};
use tactica_domain::battle::hit::flags;
use tactica_domain::{
    AudioPriority, BlockColor, CardClass, Direction, Element, Playback, PressedInput, Rank, ReleasedInput,
    Team, TileState,
};

/// Register every script enum.
pub fn register(registry: &mut BindingRegistry) -> Result<(), BindingError> {
    let tables: [(&str, &[(&str, i64)]); 12] = [
        (Team::SCRIPT_NAME, Team::ENTRIES),
        (Element::SCRIPT_NAME, Element::ENTRIES),
        (Direction::SCRIPT_NAME, Direction::ENTRIES),
        (Playback::SCRIPT_NAME, Playback::ENTRIES),
        (TileState::SCRIPT_NAME, TileState::ENTRIES),
        (Rank::SCRIPT_NAME, Rank::ENTRIES),
        (AudioPriority::SCRIPT_NAME, AudioPriority::ENTRIES),
        (CardClass::SCRIPT_NAME, CardClass::ENTRIES),
        (BlockColor::SCRIPT_NAME, BlockColor::ENTRIES),
        (PressedInput::SCRIPT_NAME, PressedInput::ENTRIES),
        (ReleasedInput::SCRIPT_NAME, ReleasedInput::ENTRIES),
        ("Hit", flags::ENTRIES),
    ];
    for (path, entries) in tables {
        registry.register_enum(path, entries)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::scripting::test_support::TestEnvironment;
    use mlua::prelude::*;

    #[test]
    fn test_enum_values_from_lua() {
        let env = TestEnvironment::new();
        let (blue, fire, shoot, released, flinch): (i64, i64, i64, i64, i64) = env
            .lua
            .load(
                "return Team.Blue, Element.Fire, Input.Pressed.Shoot, Input.Released.Use, Hit.Flinch",
            )
            .eval()
            .unwrap();
        assert_eq!((blue, fire, shoot, released, flinch), (1, 1, 6, 104, 0x0008));
    }

    #[test]
    fn test_enum_tables_are_read_only() {
        let env = TestEnvironment::new();
        env.lua
            .load("Team.Red = 99\nElement.Magma = 12")
            .set_name("@enums.lua")
            .exec()
            .unwrap();
        let red: i64 = env.lua.load("return Team.Red").eval().unwrap();
        assert_eq!(red, 0);

        let unknown: LuaValue = env.lua.load("return Direction.Sideways").eval().unwrap();
        assert_eq!(unknown, LuaValue::Nil);

        let diagnostics = env.diagnostics.snapshot();
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics[0].message.ends_with("\"Red\" is read-only"));
        assert_eq!(
            diagnostics[1].message,
            "Attempted to assign to \"Magma\" in type \"Element\""
        );
        assert_eq!(
            diagnostics[1].location.as_ref().unwrap().to_string(),
            "enums.lua:2"
        );
        assert_eq!(
            diagnostics[2].message,
            "Attempted to access \"Sideways\" in type \"Direction\""
        );
    }
}
