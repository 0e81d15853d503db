//! The battle grid. The field is the owner of every spawned entity; script handles
//! to those entities are weak and expire once the field drops them.

use super::entity::{Entity, EntityId, EntityKind};
use super::enums::{Element, Team, TileState};
use crate::core::error::DomainError;
use crate::core::handle::{Handle, NativeType, Shared};
use crate::scripting::event::{EventArg, EventKind, NativeEvent};
use std::sync::Arc;

#[derive(Debug)]
pub struct Field {
    width: i64,
    height: i64,
    tiles: Vec<TileState>,
    entities: Vec<Shared<Entity>>,
}

/// Per-update copy of the fields hit resolution needs.
struct Snapshot {
    entity: Shared<Entity>,
    id: EntityId,
    kind: EntityKind,
    team: Team,
    tile: Option<(i64, i64)>,
    deleted: bool,
}

impl Field {
    pub const DEFAULT_WIDTH: i64 = 6;
    pub const DEFAULT_HEIGHT: i64 = 3;

    pub fn new(width: i64, height: i64) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            tiles: vec![TileState::Normal; (width * height) as usize],
            entities: Vec::new(),
        }
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        (0..self.width).contains(&x) && (0..self.height).contains(&y)
    }

    fn index(&self, x: i64, y: i64) -> Result<usize, DomainError> {
        if self.contains(x, y) {
            Ok((y * self.width + x) as usize)
        } else {
            Err(DomainError::OutOfBounds { x, y })
        }
    }

    pub fn tile_state(&self, x: i64, y: i64) -> Result<TileState, DomainError> {
        self.index(x, y).map(|i| self.tiles[i])
    }

    pub fn set_tile_state(&mut self, x: i64, y: i64, state: TileState) -> Result<(), DomainError> {
        let i = self.index(x, y)?;
        self.tiles[i] = state;
        Ok(())
    }

    /// Move `entity` onto `field` at `(x, y)`; the field becomes its owner.
    ///
    /// An entity lives on at most one field, once.
    pub fn spawn(
        field: &Shared<Field>,
        entity: Shared<Entity>,
        x: i64,
        y: i64,
    ) -> Result<EntityId, DomainError> {
        let weak = Arc::downgrade(field);
        Handle::wrap(field).with_mut(|f| {
            f.index(x, y)?;
            let listed = f.entities.iter().any(|e| Arc::ptr_eq(e, &entity));
            let id = Handle::wrap(&entity).with_mut(|e| {
                let elsewhere = e.field().is_some_and(|other| !Arc::ptr_eq(&other, field));
                if listed || elsewhere {
                    return Err(DomainError::AlreadySpawned { id: e.id() });
                }
                e.place((x, y), weak);
                Ok(e.id())
            })??;
            f.entities.push(entity);
            Ok(id)
        })?
    }

    pub fn entities(&self) -> &[Shared<Entity>] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn find(&self, id: EntityId) -> Option<Shared<Entity>> {
        self.entities
            .iter()
            .find(|e| Handle::wrap(*e).with(|e| e.id()).ok() == Some(id))
            .cloned()
    }

    /// Take `id` off the field. Dropping the returned value destroys the entity
    /// unless something else still owns it.
    pub fn remove(&mut self, id: EntityId) -> Option<Shared<Entity>> {
        let pos = self
            .entities
            .iter()
            .position(|e| Handle::wrap(e).with(|e| e.id()).ok() == Some(id))?;
        let entity = self.entities.remove(pos);
        // Busy here means a script is mid-call on it; the tile is cleared on its next placement.
        let _ = Handle::wrap(&entity).with_mut(Entity::unplace);
        Some(entity)
    }

    /// Drop every entity flagged with [`Entity::delete`].
    pub fn remove_deleted(&mut self) -> Vec<Shared<Entity>> {
        let (deleted, kept): (Vec<_>, Vec<_>) = self
            .entities
            .drain(..)
            .partition(|e| Handle::wrap(e).with(Entity::is_deleted).unwrap_or(false));
        self.entities = kept;
        deleted
    }

    /// One simulation step: animations first, then hit resolution.
    ///
    /// Events are returned in detection order for the callback bridge.
    pub fn update(&mut self, frames: u32) -> Result<Vec<NativeEvent>, DomainError> {
        let mut events = self.step_animations(frames)?;
        events.extend(self.resolve_hits()?);
        Ok(events)
    }

    fn step_animations(&self, frames: u32) -> Result<Vec<NativeEvent>, DomainError> {
        let mut events = Vec::new();
        for entity in &self.entities {
            let animation = Handle::wrap(entity)
                .with(|e| (!e.is_deleted()).then(|| e.animation().clone()))?;
            if let Some(animation) = animation {
                events.extend(Handle::wrap(&animation).with_mut(|a| a.advance(frames))?);
            }
        }
        Ok(events)
    }

    fn snapshot(&self) -> Result<Vec<Snapshot>, DomainError> {
        self.entities
            .iter()
            .map(|entity| {
                Handle::wrap(entity).with(|e| Snapshot {
                    entity: entity.clone(),
                    id: e.id(),
                    kind: e.kind(),
                    team: e.team(),
                    tile: e.tile(),
                    deleted: e.is_deleted(),
                })
            })
            .collect()
    }

    /// Spells hit every opposing character sharing their tile, once per target.
    fn resolve_hits(&self) -> Result<Vec<NativeEvent>, DomainError> {
        let snapshot = self.snapshot()?;
        let mut events = Vec::new();

        let spells = snapshot
            .iter()
            .filter(|s| s.kind == EntityKind::Spell && !s.deleted && s.tile.is_some());
        for spell in spells {
            let targets = snapshot.iter().filter(|t| {
                t.kind == EntityKind::Character
                    && !t.deleted
                    && t.tile == spell.tile
                    && t.team != spell.team
            });
            for target in targets {
                let (fresh, props, attack, collision) =
                    Handle::wrap(&spell.entity).with_mut(|s| {
                        (
                            s.record_hit(target.id),
                            s.hit_props().clone(),
                            s.attack_callback(),
                            s.collision_callback(),
                        )
                    })?;
                if !fresh {
                    continue;
                }

                Handle::wrap(&target.entity).with_mut(|t| {
                    let defender: Element = t.element();
                    t.apply_damage(props.damage_against(defender))
                })?;

                if let Some(cb) = collision {
                    events.push(
                        NativeEvent::new(EventKind::Collision, cb)
                            .with_arg(EventArg::Entity(Handle::wrap(&spell.entity)))
                            .with_arg(EventArg::Entity(Handle::wrap(&target.entity))),
                    );
                }
                if let Some(cb) = attack {
                    events.push(
                        NativeEvent::new(EventKind::AttackResolved, cb)
                            .with_arg(EventArg::Entity(Handle::wrap(&target.entity))),
                    );
                }
            }
        }
        Ok(events)
    }
}

impl Default for Field {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WIDTH, Self::DEFAULT_HEIGHT)
    }
}

impl NativeType for Field {
    const TYPE_NAME: &'static str = "Field";
}
