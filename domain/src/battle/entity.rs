//! Battle entities: characters placed by mobs and spells created by scripts.

use super::animation::Animation;
use super::enums::{Direction, Element, Rank, Team};
use super::field::Field;
use super::hit::HitProps;
use super::sprite::SpriteNode;
use crate::core::handle::{NativeType, Shared, share};
use crate::scripting::event::CallbackId;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Weak};

pub type EntityId = u64;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

fn next_entity_id() -> EntityId {
    NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Spell,
}

#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    name: String,
    /// FQN of the character package that built this entity.
    fqn: Option<String>,
    team: Team,
    element: Element,
    facing: Direction,
    rank: Rank,
    health: i64,
    max_health: i64,
    tile: Option<(i64, i64)>,
    hit_props: HitProps,
    deleted: bool,
    animation: Shared<Animation>,
    /// Root of the entity's sprite tree.
    sprite: Shared<SpriteNode>,
    field: Option<Weak<Mutex<Field>>>,
    attack_callback: Option<CallbackId>,
    collision_callback: Option<CallbackId>,
    /// Entities this spell already hit.
    hit_targets: Vec<EntityId>,
}

impl Entity {
    fn new(kind: EntityKind, team: Team) -> Self {
        Self {
            id: next_entity_id(),
            kind,
            name: String::new(),
            fqn: None,
            team,
            element: Element::None,
            facing: match team {
                Team::Blue => Direction::Left,
                _ => Direction::Right,
            },
            rank: Rank::V1,
            health: 0,
            max_health: 0,
            tile: None,
            hit_props: HitProps::default(),
            deleted: false,
            animation: share(Animation::new("")),
            sprite: share(SpriteNode::new()),
            field: None,
            attack_callback: None,
            collision_callback: None,
            hit_targets: Vec::new(),
        }
    }

    pub fn character(fqn: impl Into<String>, team: Team, rank: Rank) -> Self {
        let fqn = fqn.into();
        let mut entity = Self::new(EntityKind::Character, team);
        entity.name = fqn.rsplit('.').next().unwrap_or(&fqn).to_string();
        entity.fqn = Some(fqn);
        entity.rank = rank;
        entity
    }

    pub fn spell(team: Team) -> Self {
        Self::new(EntityKind::Spell, team)
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn fqn(&self) -> Option<&str> {
        self.fqn.as_deref()
    }

    pub fn team(&self) -> Team {
        self.team
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn set_element(&mut self, element: Element) {
        self.element = element;
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn set_facing(&mut self, facing: Direction) {
        self.facing = facing;
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn health(&self) -> i64 {
        self.health
    }

    pub fn max_health(&self) -> i64 {
        self.max_health
    }

    /// Sets both current and maximum health.
    pub fn set_health(&mut self, health: i64) {
        self.health = health.max(0);
        self.max_health = self.health;
    }

    /// Subtract `amount` and return the remaining health.
    pub fn apply_damage(&mut self, amount: i64) -> i64 {
        self.health = (self.health - amount.max(0)).max(0);
        self.health
    }

    pub fn tile(&self) -> Option<(i64, i64)> {
        self.tile
    }

    pub(super) fn place(&mut self, tile: (i64, i64), field: Weak<Mutex<Field>>) {
        self.tile = Some(tile);
        self.field = Some(field);
    }

    pub(super) fn unplace(&mut self) {
        self.tile = None;
        self.field = None;
    }

    /// Field this entity was spawned on, if it is still alive.
    pub fn field(&self) -> Option<Shared<Field>> {
        self.field.as_ref().and_then(Weak::upgrade)
    }

    pub fn hit_props(&self) -> &HitProps {
        &self.hit_props
    }

    pub fn set_hit_props(&mut self, props: HitProps) {
        self.hit_props = props;
    }

    pub fn animation(&self) -> &Shared<Animation> {
        &self.animation
    }

    pub fn sprite_node(&self) -> &Shared<SpriteNode> {
        &self.sprite
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Flag for removal; the field drops it on its next cleanup.
    pub fn delete(&mut self) {
        self.deleted = true;
    }

    pub fn attack_callback(&self) -> Option<CallbackId> {
        self.attack_callback
    }

    pub fn collision_callback(&self) -> Option<CallbackId> {
        self.collision_callback
    }

    /// Install attack/collision callbacks, returning the ids they replaced.
    pub fn set_callbacks(
        &mut self,
        attack: Option<CallbackId>,
        collision: Option<CallbackId>,
    ) -> Vec<CallbackId> {
        let replaced = [self.attack_callback, self.collision_callback]
            .into_iter()
            .flatten()
            .collect();
        self.attack_callback = attack;
        self.collision_callback = collision;
        replaced
    }

    pub(super) fn record_hit(&mut self, target: EntityId) -> bool {
        if self.hit_targets.contains(&target) {
            false
        } else {
            self.hit_targets.push(target);
            true
        }
    }
}

impl NativeType for Entity {
    const TYPE_NAME: &'static str = "Entity";
}
