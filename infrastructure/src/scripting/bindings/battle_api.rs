//! `Battle.*` bindings: entities, hitboxes, the field, mobs and hit descriptors.
//!
//! ```lua
//! local spell = Battle.Hitbox.new(Team.Red)
//! spell:set_hit_props(make_hit_props(20, Hit.Flinch, Element.Fire, nil, no_drag()))
//! spell:set_callbacks(nil, function(self, other) self:erase() end)
//! field:spawn(spell, 3, 1)
//! ```
//!
//! Entities handed to scripts are weak unless the script created them.
//! `field:spawn` moves a script-owned hitbox onto the field, which becomes
//! its only owner.

use mlua::prelude::*;
use tactica_domain::{
    Animation, CallbackId, CardClass, CardProperties, Direction, Drag, Element, Entity,
    EntityId, Field, FireMode, Handle, HitProps, Mob, Rank, Shared, Spawner, TileState,
};

use super::{BindingError, BindingRegistry, TypeBinding};
use crate::scripting::callback_bridge::owner_of;
use crate::scripting::environment::services;
use crate::scripting::handle::{ScriptHandle, enum_arg, handle_arg, value_arg};

const NAMESPACE: &str = "Battle";

pub fn register(registry: &mut BindingRegistry) -> Result<(), BindingError> {
    registry.register_type(entity_binding())?;
    registry.register_type(field_binding())?;
    registry.register_type(mob_binding())?;
    registry.register_type(spawner_binding())?;
    registry.register_type(hit_props_binding())?;
    registry.register_type(drag_binding())?;
    registry.register_type(card_props_binding())?;

    registry.register_function("Battle.Hitbox", "new", |_, team: i64| {
        Ok(ScriptHandle::owning(Entity::spell(enum_arg(team)?)))
    })?;

    registry.register_function("", "make_hit_props", |_, args: HitPropsArgs| {
        Ok(ScriptHandle::owning(args.into_props()?))
    })?;
    registry.register_function("", "drag", |_, (direction, count): (i64, Option<u32>)| {
        Ok(ScriptHandle::owning(Drag::new(
            enum_arg(direction)?,
            count.unwrap_or(1),
        )))
    })?;
    registry.register_function("", "no_drag", |_, ()| {
        Ok(ScriptHandle::owning(Drag::none()))
    })?;
    // Durations are already expressed in frames.
    registry.register_function("", "frames", |_, count: i64| Ok(count))?;
    Ok(())
}

/// Every callback id an entity (and its animation) still references.
pub fn entity_callbacks(entity: &Shared<Entity>) -> Vec<CallbackId> {
    Handle::wrap(entity)
        .with(|e| {
            let mut ids: Vec<CallbackId> = [e.attack_callback(), e.collision_callback()]
                .into_iter()
                .flatten()
                .collect();
            ids.extend(
                Handle::wrap(e.animation())
                    .with(Animation::callbacks)
                    .unwrap_or_default(),
            );
            ids
        })
        .unwrap_or_default()
}

fn entity_binding() -> TypeBinding<Entity> {
    TypeBinding::<Entity>::new(NAMESPACE)
        .method("get_id", |e: &mut Entity, ()| Ok(e.id()))
        .method("get_name", |e: &mut Entity, ()| Ok(e.name().to_string()))
        .method("set_name", |e: &mut Entity, name: String| {
            e.set_name(name);
            Ok(())
        })
        .method("get_fqn", |e: &mut Entity, ()| Ok(e.fqn().map(str::to_string)))
        .method("get_team", |e: &mut Entity, ()| Ok(e.team().value()))
        .method("get_element", |e: &mut Entity, ()| Ok(e.element().value()))
        .method("set_element", |e: &mut Entity, element: i64| {
            e.set_element(enum_arg(element)?);
            Ok(())
        })
        .method("get_facing", |e: &mut Entity, ()| Ok(e.facing().value()))
        .method("set_facing", |e: &mut Entity, facing: i64| {
            e.set_facing(enum_arg(facing)?);
            Ok(())
        })
        .method("get_rank", |e: &mut Entity, ()| Ok(e.rank().value()))
        .method("get_health", |e: &mut Entity, ()| Ok(e.health()))
        .method("set_health", |e: &mut Entity, health: i64| {
            e.set_health(health);
            Ok(())
        })
        .method("get_max_health", |e: &mut Entity, ()| Ok(e.max_health()))
        .method("get_tile", |e: &mut Entity, ()| {
            Ok(match e.tile() {
                Some((x, y)) => (Some(x), Some(y)),
                None => (None, None),
            })
        })
        .method("get_field", |e: &mut Entity, ()| {
            Ok(e.field().map(|field| ScriptHandle::new(Handle::wrap(&field))))
        })
        .method("get_animation", |e: &mut Entity, ()| {
            Ok(ScriptHandle::new(Handle::wrap(e.animation())))
        })
        .method("sprite", |e: &mut Entity, ()| {
            Ok(ScriptHandle::new(Handle::wrap(e.sprite_node())))
        })
        .method("get_hit_props", |e: &mut Entity, ()| {
            Ok(ScriptHandle::owning(e.hit_props().clone()))
        })
        .method("set_hit_props", |e: &mut Entity, props: LuaValue| {
            e.set_hit_props(value_arg::<HitProps>(&props)?);
            Ok(())
        })
        .handle_method("copy_hit_props", |_, this, other: LuaValue| {
            // Read first: `other` may be this very entity.
            let props = handle_arg::<Entity>(&other)?
                .with(|o| o.hit_props().clone())
                .map_err(LuaError::external)?;
            this.with_mut(|e| e.set_hit_props(props))
                .map_err(LuaError::external)
        })
        .handle_method(
            "set_callbacks",
            |lua, this, (attack, collision): (Option<LuaFunction>, Option<LuaFunction>)| {
                let services = services(lua)?;
                let owner = owner_of(this)?;
                let register = |function: Option<LuaFunction>| {
                    function
                        .map(|f| {
                            services.bridge.register(
                                lua,
                                f,
                                FireMode::Repeatable,
                                Some(owner.clone()),
                            )
                        })
                        .transpose()
                };
                let attack = register(attack)?;
                let collision = register(collision)?;

                match this.with_mut(|e| e.set_callbacks(attack, collision)) {
                    Ok(replaced) => {
                        services.bridge.release(&replaced);
                        Ok(())
                    }
                    Err(error) => {
                        let fresh: Vec<_> = [attack, collision].into_iter().flatten().collect();
                        services.bridge.release(&fresh);
                        Err(LuaError::external(error))
                    }
                }
            },
        )
        .method("delete", |e: &mut Entity, ()| {
            e.delete();
            Ok(())
        })
        .method("is_deleted", |e: &mut Entity, ()| Ok(e.is_deleted()))
        .handle_method("erase", |lua, this, ()| {
            let (id, field) = this
                .with(|e| (e.id(), e.field()))
                .map_err(LuaError::external)?;
            let Some(field) = field else {
                return Ok(false);
            };
            let removed = Handle::wrap(&field)
                .with_mut(|f| f.remove(id))
                .map_err(LuaError::external)?;
            match removed {
                Some(entity) => {
                    services(lua)?.bridge.release(&entity_callbacks(&entity));
                    Ok(true)
                }
                None => Ok(false),
            }
        })
}

fn field_binding() -> TypeBinding<Field> {
    TypeBinding::<Field>::new(NAMESPACE)
        .property("width", Field::width)
        .property("height", Field::height)
        .method("get_tile_state", |f: &mut Field, (x, y): (i64, i64)| {
            f.tile_state(x, y)
                .map(TileState::value)
                .map_err(LuaError::external)
        })
        .method(
            "set_tile_state",
            |f: &mut Field, (x, y, state): (i64, i64, i64)| {
                f.set_tile_state(x, y, enum_arg(state)?)
                    .map_err(LuaError::external)
            },
        )
        .handle_method(
            "spawn",
            |_, this, (entity, x, y): (LuaAnyUserData, i64, i64)| {
                let target = entity
                    .borrow::<ScriptHandle<Entity>>()?
                    .handle()
                    .unwrap()
                    .map_err(LuaError::external)?;
                let field = this.unwrap().map_err(LuaError::external)?;
                let id: EntityId = Field::spawn(&field, target, x, y).map_err(LuaError::external)?;
                // The field is the owner from now on.
                entity.borrow_mut::<ScriptHandle<Entity>>()?.release();
                Ok(id)
            },
        )
        .method("find_entity", |f: &mut Field, id: EntityId| {
            Ok(f.find(id).map(|e| ScriptHandle::new(Handle::wrap(&e))))
        })
        .method("entity_count", |f: &mut Field, ()| Ok(f.len()))
}

fn mob_binding() -> TypeBinding<Mob> {
    TypeBinding::<Mob>::new(NAMESPACE)
        .method("set_background", |m: &mut Mob, path: String| {
            m.set_background(path);
            Ok(())
        })
        .method("get_background", |m: &mut Mob, ()| {
            Ok(m.background().map(str::to_string))
        })
        .method("set_music", |m: &mut Mob, path: String| {
            m.set_music(path);
            Ok(())
        })
        .method("get_music", |m: &mut Mob, ()| Ok(m.music().map(str::to_string)))
        .method(
            "create_spawner",
            |m: &mut Mob, (fqn, rank): (String, Option<i64>)| {
                let rank = rank.map(enum_arg).transpose()?.unwrap_or(Rank::V1);
                let spawner = m.create_spawner(fqn, rank);
                Ok(ScriptHandle::new(Handle::wrap(&spawner)))
            },
        )
}

fn spawner_binding() -> TypeBinding<Spawner> {
    TypeBinding::<Spawner>::new(NAMESPACE)
        .method("spawn_at", |s: &mut Spawner, (x, y): (i64, i64)| {
            s.spawn_at(x, y);
            Ok(())
        })
        .method("get_fqn", |s: &mut Spawner, ()| Ok(s.fqn().to_string()))
        .method("get_rank", |s: &mut Spawner, ()| Ok(s.rank().value()))
}

/// `(damage, flags, element, aggressor, drag)`, every part optional.
struct HitPropsArgs {
    damage: Option<i64>,
    flags: Option<u32>,
    element: Option<i64>,
    aggressor: Option<u64>,
    drag: LuaValue,
}

impl FromLuaMulti for HitPropsArgs {
    fn from_lua_multi(values: LuaMultiValue, lua: &Lua) -> LuaResult<Self> {
        let (damage, flags, element, aggressor, drag) =
            <(Option<i64>, Option<u32>, Option<i64>, Option<u64>, LuaValue)>::from_lua_multi(
                values, lua,
            )?;
        Ok(Self {
            damage,
            flags,
            element,
            aggressor,
            drag,
        })
    }
}

impl HitPropsArgs {
    fn into_props(self) -> LuaResult<HitProps> {
        let drag = match self.drag {
            LuaValue::Nil => Drag::none(),
            other => value_arg::<Drag>(&other)?,
        };
        Ok(HitProps::new(
            self.damage.unwrap_or(0),
            self.flags.unwrap_or(0),
            self.element.map(enum_arg).transpose()?.unwrap_or(Element::None),
            self.aggressor,
            drag,
        ))
    }
}

fn hit_props_binding() -> TypeBinding<HitProps> {
    TypeBinding::<HitProps>::new(NAMESPACE)
        .property_rw(
            "damage",
            |p: &HitProps| p.damage,
            |p: &mut HitProps, damage: i64| {
                p.damage = damage;
                Ok(())
            },
        )
        .property_rw(
            "flags",
            |p: &HitProps| p.flags,
            |p: &mut HitProps, flags: u32| {
                p.flags = flags;
                Ok(())
            },
        )
        .property_rw(
            "element",
            |p: &HitProps| p.element.value(),
            |p: &mut HitProps, element: i64| {
                p.element = enum_arg(element)?;
                Ok(())
            },
        )
        .property_rw(
            "secondary_element",
            |p: &HitProps| p.secondary_element.value(),
            |p: &mut HitProps, element: i64| {
                p.secondary_element = enum_arg(element)?;
                Ok(())
            },
        )
        .property_rw(
            "aggressor",
            |p: &HitProps| p.aggressor,
            |p: &mut HitProps, aggressor: Option<u64>| {
                p.aggressor = aggressor;
                Ok(())
            },
        )
        .property_rw(
            "drag",
            |p: &HitProps| ScriptHandle::owning(p.drag),
            |p: &mut HitProps, drag: LuaValue| {
                p.drag = value_arg(&drag)?;
                Ok(())
            },
        )
        .constructor("new", |_, args: HitPropsArgs| {
            Ok(ScriptHandle::owning(args.into_props()?))
        })
}

fn drag_binding() -> TypeBinding<Drag> {
    TypeBinding::<Drag>::new(NAMESPACE)
        .property_rw(
            "direction",
            |d: &Drag| d.direction.value(),
            |d: &mut Drag, direction: i64| {
                d.direction = enum_arg::<Direction>(direction)?;
                Ok(())
            },
        )
        .property_rw(
            "count",
            |d: &Drag| d.count,
            |d: &mut Drag, count: u32| {
                d.count = count;
                Ok(())
            },
        )
        .constructor("new", |_, (direction, count): (i64, u32)| {
            Ok(ScriptHandle::owning(Drag::new(enum_arg(direction)?, count)))
        })
}

fn card_props_binding() -> TypeBinding<CardProperties> {
    TypeBinding::<CardProperties>::new(NAMESPACE)
        .property_rw(
            "short_name",
            |c: &CardProperties| c.short_name.clone(),
            |c: &mut CardProperties, v: String| {
                c.short_name = v;
                Ok(())
            },
        )
        .property_rw(
            "description",
            |c: &CardProperties| c.description.clone(),
            |c: &mut CardProperties, v: String| {
                c.description = v;
                Ok(())
            },
        )
        .property_rw(
            "code",
            |c: &CardProperties| c.code.clone(),
            |c: &mut CardProperties, v: String| {
                c.code = v;
                Ok(())
            },
        )
        .property_rw(
            "damage",
            |c: &CardProperties| c.damage,
            |c: &mut CardProperties, v: i64| {
                c.damage = v;
                Ok(())
            },
        )
        .property_rw(
            "element",
            |c: &CardProperties| c.element.value(),
            |c: &mut CardProperties, v: i64| {
                c.element = enum_arg(v)?;
                Ok(())
            },
        )
        .property_rw(
            "secondary_element",
            |c: &CardProperties| c.secondary_element.value(),
            |c: &mut CardProperties, v: i64| {
                c.secondary_element = enum_arg(v)?;
                Ok(())
            },
        )
        .property_rw(
            "card_class",
            |c: &CardProperties| c.card_class.value(),
            |c: &mut CardProperties, v: i64| {
                c.card_class = enum_arg::<CardClass>(v)?;
                Ok(())
            },
        )
        .property_rw(
            "time_freeze",
            |c: &CardProperties| c.time_freeze,
            |c: &mut CardProperties, v: bool| {
                c.time_freeze = v;
                Ok(())
            },
        )
        .property_rw(
            "can_boost",
            |c: &CardProperties| c.can_boost,
            |c: &mut CardProperties, v: bool| {
                c.can_boost = v;
                Ok(())
            },
        )
        .property_rw(
            "limit",
            |c: &CardProperties| c.limit,
            |c: &mut CardProperties, v: u32| {
                c.limit = v;
                Ok(())
            },
        )
        .constructor("new", |_, ()| {
            Ok(ScriptHandle::owning(CardProperties::default()))
        })
}
