//! Battle objects reachable from scripts.
//!
//! Only the surface scripts touch is modelled here. Rendering, AI and the full
//! combat rules belong to the host engine.

pub mod animation;
pub mod card;
pub mod entity;
pub mod enums;
pub mod field;
pub mod hit;
pub mod mob;
pub mod sprite;

pub use animation::{Animation, StateChange};
pub use card::CardProperties;
pub use entity::{Entity, EntityId, EntityKind};
pub use enums::{
    AudioPriority, BlockColor, CardClass, Direction, Element, Playback, PressedInput, Rank,
    ReleasedInput, Team, TileState,
};
pub use field::Field;
pub use hit::{Drag, HitProps};
pub use mob::{Mob, SpawnRequest, Spawner};
pub use sprite::{Color, SpriteNode};
