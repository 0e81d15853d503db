//! Hit descriptors attached to attacks.

use super::enums::{Direction, Element};
use crate::core::handle::NativeType;
use serde::{Deserialize, Serialize};

/// Bit flags describing how a hit behaves (`Hit.*` in scripts).
pub mod flags {
    pub const NONE: u32 = 0x0000;
    pub const RETANGIBLE: u32 = 0x0001;
    pub const FREEZE: u32 = 0x0002;
    pub const PIERCE: u32 = 0x0004;
    pub const FLINCH: u32 = 0x0008;
    pub const SHAKE: u32 = 0x0010;
    pub const STUN: u32 = 0x0020;
    pub const FLASH: u32 = 0x0040;
    pub const BREAKING: u32 = 0x0080;
    pub const IMPACT: u32 = 0x0100;
    pub const DRAG: u32 = 0x0200;
    pub const BUBBLE: u32 = 0x0400;
    pub const NO_COUNTER: u32 = 0x0800;
    pub const ROOT: u32 = 0x1000;
    pub const BLIND: u32 = 0x2000;
    pub const CONFUSE: u32 = 0x4000;

    /// `(label, value)` pairs published as the `Hit` table.
    pub const ENTRIES: &[(&str, i64)] = &[
        ("None", NONE as i64),
        ("Retangible", RETANGIBLE as i64),
        ("Freeze", FREEZE as i64),
        ("Pierce", PIERCE as i64),
        ("Flinch", FLINCH as i64),
        ("Shake", SHAKE as i64),
        ("Stun", STUN as i64),
        ("Flash", FLASH as i64),
        ("Breaking", BREAKING as i64),
        ("Impact", IMPACT as i64),
        ("Drag", DRAG as i64),
        ("Bubble", BUBBLE as i64),
        ("NoCounter", NO_COUNTER as i64),
        ("Root", ROOT as i64),
        ("Blind", BLIND as i64),
        ("Confuse", CONFUSE as i64),
    ];
}

/// Knockback applied by a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Drag {
    pub direction: Direction,
    pub count: u32,
}

impl Drag {
    pub fn new(direction: Direction, count: u32) -> Self {
        Self { direction, count }
    }

    /// The "no knockback" value.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.direction == Direction::None || self.count == 0
    }
}

impl NativeType for Drag {
    const TYPE_NAME: &'static str = "Drag";
}

/// Damage and status information carried by an attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitProps {
    pub damage: i64,
    pub flags: u32,
    pub element: Element,
    pub secondary_element: Element,
    /// Entity credited with the hit.
    pub aggressor: Option<u64>,
    pub drag: Drag,
}

impl HitProps {
    pub fn new(
        damage: i64,
        flags: u32,
        element: Element,
        aggressor: Option<u64>,
        drag: Drag,
    ) -> Self {
        Self {
            damage,
            flags,
            element,
            secondary_element: Element::None,
            aggressor,
            drag,
        }
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag == flag
    }

    /// Damage after elemental weakness is applied to a defender of `defender`.
    pub fn damage_against(&self, defender: Element) -> i64 {
        let weak = |attacker: Element| {
            matches!(
                (attacker, defender),
                (Element::Fire, Element::Wood)
                    | (Element::Wood, Element::Elec)
                    | (Element::Elec, Element::Aqua)
                    | (Element::Aqua, Element::Fire)
                    | (Element::Sword, Element::Wind)
                    | (Element::Wind, Element::Cursor)
                    | (Element::Cursor, Element::Break)
                    | (Element::Break, Element::Sword)
            )
        };
        if weak(self.element) || weak(self.secondary_element) {
            self.damage * 2
        } else {
            self.damage
        }
    }
}

impl Default for HitProps {
    fn default() -> Self {
        Self::new(0, flags::NONE, Element::None, None, Drag::none())
    }
}

impl NativeType for HitProps {
    const TYPE_NAME: &'static str = "HitProps";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let props = HitProps::new(
            10,
            flags::FLINCH | flags::IMPACT,
            Element::None,
            None,
            Drag::none(),
        );
        assert!(props.has_flag(flags::FLINCH));
        assert!(props.has_flag(flags::IMPACT));
        assert!(!props.has_flag(flags::STUN));
    }

    #[test]
    fn test_weakness_doubles_damage() {
        let props = HitProps::new(20, flags::NONE, Element::Fire, None, Drag::none());
        assert_eq!(props.damage_against(Element::Wood), 40);
        assert_eq!(props.damage_against(Element::Aqua), 20);
    }

    #[test]
    fn test_drag_none() {
        assert!(Drag::none().is_none());
        assert!(Drag::new(Direction::Right, 0).is_none());
        assert!(!Drag::new(Direction::Right, 1).is_none());
    }
}
