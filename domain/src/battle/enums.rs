//! Small value enums shared by the battle engine and script bindings.
//!
//! Every enum carries a stable integer encoding (what scripts see) and the list
//! of `(label, value)` entries used to publish it as a read-only script table.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Defines an enum with a stable script encoding.
macro_rules! script_enum {
    (
        $(#[$meta:meta])*
        $name:ident as $script_name:literal {
            $($variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Name of the script-visible table.
            pub const SCRIPT_NAME: &'static str = $script_name;

            /// `(label, value)` pairs in declaration order.
            pub const ENTRIES: &'static [(&'static str, i64)] =
                &[$((stringify!($variant), $value)),+];

            pub fn value(self) -> i64 {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }

        impl TryFrom<i64> for $name {
            type Error = DomainError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(DomainError::UnknownEnumValue {
                        enum_name: $script_name,
                        value,
                    }),
                }
            }
        }
    };
}

script_enum! {
    /// Side an entity fights for.
    Team as "Team" {
        Red = 0,
        Blue = 1,
        Other = 2,
    }
}

script_enum! {
    Element as "Element" {
        None = 0,
        Fire = 1,
        Aqua = 2,
        Elec = 3,
        Wood = 4,
        Sword = 5,
        Wind = 6,
        Cursor = 7,
        Summon = 8,
        Plus = 9,
        Break = 10,
        Ice = 11,
    }
}

script_enum! {
    Direction as "Direction" {
        None = 0,
        Up = 1,
        Down = 2,
        Left = 3,
        Right = 4,
        UpLeft = 5,
        UpRight = 6,
        DownLeft = 7,
        DownRight = 8,
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::None
    }
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::UpLeft => Self::DownRight,
            Self::UpRight => Self::DownLeft,
            Self::DownLeft => Self::UpRight,
            Self::DownRight => Self::UpLeft,
        }
    }

    pub fn flip_x(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::UpLeft => Self::UpRight,
            Self::UpRight => Self::UpLeft,
            Self::DownLeft => Self::DownRight,
            Self::DownRight => Self::DownLeft,
            other => other,
        }
    }

    pub fn flip_y(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::UpLeft => Self::DownLeft,
            Self::DownLeft => Self::UpLeft,
            Self::UpRight => Self::DownRight,
            Self::DownRight => Self::UpRight,
            other => other,
        }
    }

    /// Unit tile offset `(dx, dy)`; `Up` is towards row 0.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Self::None => (0, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::UpLeft => (-1, -1),
            Self::UpRight => (1, -1),
            Self::DownLeft => (-1, 1),
            Self::DownRight => (1, 1),
        }
    }
}

script_enum! {
    /// Animation playback mode.
    Playback as "Playback" {
        Once = 0,
        Loop = 1,
    }
}

script_enum! {
    TileState as "TileState" {
        Normal = 0,
        Cracked = 1,
        Broken = 2,
        Empty = 3,
        Hidden = 4,
        Grass = 5,
        Holy = 6,
        Ice = 7,
        Lava = 8,
        Poison = 9,
        Volcano = 10,
    }
}

script_enum! {
    /// Virus rank attached to a spawned character.
    Rank as "Rank" {
        V1 = 0,
        V2 = 1,
        V3 = 2,
        SP = 3,
        EX = 4,
        Rare1 = 5,
        Rare2 = 6,
        NM = 7,
    }
}

script_enum! {
    AudioPriority as "AudioPriority" {
        Lowest = 0,
        Low = 1,
        High = 2,
        Highest = 3,
    }
}

script_enum! {
    CardClass as "CardClass" {
        Standard = 0,
        Mega = 1,
        Giga = 2,
        Dark = 3,
    }
}

script_enum! {
    /// Color of a navi customization block.
    BlockColor as "Blocks" {
        White = 0,
        Red = 1,
        Green = 2,
        Blue = 3,
        Pink = 4,
        Yellow = 5,
    }
}

script_enum! {
    /// Buttons as reported on the frame they went down.
    PressedInput as "Input.Pressed" {
        Up = 0,
        Left = 1,
        Right = 2,
        Down = 3,
        Use = 4,
        Special = 5,
        Shoot = 6,
    }
}

script_enum! {
    /// Buttons as reported on the frame they were let go.
    ReleasedInput as "Input.Released" {
        Up = 100,
        Left = 101,
        Right = 102,
        Down = 103,
        Use = 104,
        Special = 105,
        Shoot = 106,
    }
}
