//! `Engine.*` bindings: package metadata, animations, sprite nodes, assets,
//! audio, input and the character/library registry.
//!
//! A sprite node made with `Engine.SpriteNode.new()` is owned by the script
//! until `parent:add_node(node)` hands it to the parent.

use mlua::prelude::*;
use std::path::{Path, PathBuf};
use tactica_application::InputQuery;
use tactica_domain::{
    Animation, AudioPriority, BlockColor, Color, DiagnosticKind, FireMode, Handle, PackageMeta,
    Playback, ScriptDiagnostic, SpriteNode,
};

use super::{BindingError, BindingRegistry, TypeBinding};
use crate::scripting::callback_bridge::owner_of;
use crate::scripting::environment::{runtime, services};
use crate::scripting::guards::report;
use crate::scripting::handle::{ScriptHandle, enum_arg, handle_arg};

const NAMESPACE: &str = "Engine";

pub fn register(registry: &mut BindingRegistry) -> Result<(), BindingError> {
    registry.register_type(package_meta_binding())?;
    registry.register_type(animation_binding())?;
    registry.register_type(sprite_node_binding())?;

    registry.register_function(NAMESPACE, "get_rand_seed", |lua, ()| {
        Ok(services(lua)?.settings.rand_seed)
    })?;
    registry.register_function(NAMESPACE, "load_texture", |lua, path: String| {
        let host = services(lua)?.host.clone();
        Ok(load_asset(lua, "texture", &path, |p| host.load_texture(p)))
    })?;
    registry.register_function(NAMESPACE, "load_audio", |lua, path: String| {
        let host = services(lua)?.host.clone();
        Ok(load_asset(lua, "audio", &path, |p| host.load_audio(p)))
    })?;
    registry.register_function(
        NAMESPACE,
        "play_audio",
        |lua, (path, priority): (String, Option<i64>)| {
            let priority = priority
                .map(enum_arg)
                .transpose()?
                .unwrap_or(AudioPriority::Low);
            services(lua)?.host.play_audio(&path, priority);
            Ok(())
        },
    )?;
    registry.register_function(NAMESPACE, "input_has", |lua, event: i64| {
        match InputQuery::from_script_value(event) {
            Some(query) => Ok(services(lua)?.host.input_has(query)),
            None => {
                report(
                    lua,
                    ScriptDiagnostic::new(
                        DiagnosticKind::Runtime,
                        format!("Unknown input event {}", event),
                    ),
                );
                Ok(false)
            }
        }
    })?;

    registry.register_function(
        NAMESPACE,
        "define_character",
        |lua, (fqn, path): (String, String)| {
            let dir = content_path(lua, &path)?;
            runtime(lua)?
                .define_character(&fqn, &dir)
                .map_err(LuaError::external)
        },
    )?;
    registry.register_function(
        NAMESPACE,
        "define_library",
        |lua, (fqn, path): (String, String)| {
            let dir = content_path(lua, &path)?;
            runtime(lua)?
                .define_library(&fqn, &dir)
                .map_err(LuaError::external)
        },
    )?;
    registry.register_function(NAMESPACE, "requires_character", |lua, fqn: String| {
        runtime(lua)?
            .requires_character(&fqn)
            .map_err(LuaError::external)
    })?;
    Ok(())
}

/// Relative content paths are taken from the mods root.
fn content_path(lua: &Lua, path: &str) -> LuaResult<PathBuf> {
    let path = Path::new(path);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(services(lua)?.settings.mods_root.join(path))
    }
}

fn load_asset(
    lua: &Lua,
    what: &str,
    path: &str,
    load: impl FnOnce(&Path) -> Result<(), String>,
) -> bool {
    match load(Path::new(path)) {
        Ok(()) => true,
        Err(reason) => {
            report(
                lua,
                ScriptDiagnostic::new(
                    DiagnosticKind::Runtime,
                    format!("Failed to load {} {}: {}", what, path, reason),
                ),
            );
            false
        }
    }
}

fn package_meta_binding() -> TypeBinding<PackageMeta> {
    TypeBinding::<PackageMeta>::new(NAMESPACE)
        .method("declare_package_id", |m: &mut PackageMeta, id: String| {
            m.declare_package_id(&id)
                .map(|_| ())
                .map_err(LuaError::external)
        })
        .method("get_package_id", |m: &mut PackageMeta, ()| {
            Ok(m.package_id().map(|id| id.as_str().to_string()))
        })
        .method("set_name", |m: &mut PackageMeta, name: String| {
            m.set_name(name);
            Ok(())
        })
        .method("get_name", |m: &mut PackageMeta, ()| Ok(m.name().to_string()))
        .method("set_description", |m: &mut PackageMeta, text: String| {
            m.set_description(text);
            Ok(())
        })
        .method("get_description", |m: &mut PackageMeta, ()| {
            Ok(m.description().to_string())
        })
        .method(
            "set_preview_texture_path",
            |m: &mut PackageMeta, path: String| {
                m.set_preview_texture_path(path);
                Ok(())
            },
        )
        .method("set_preview_texture", |m: &mut PackageMeta, path: String| {
            m.set_preview_texture_path(path);
            Ok(())
        })
        .method("get_card_props", |m: &mut PackageMeta, ()| {
            Ok(ScriptHandle::new(Handle::wrap(m.card_props())))
        })
        .method("set_icon_texture", |m: &mut PackageMeta, path: String| {
            m.set_icon_texture_path(path).map_err(LuaError::external)
        })
        .method("set_codes", |m: &mut PackageMeta, codes: Vec<String>| {
            m.set_codes(codes).map_err(LuaError::external)
        })
        .method("get_codes", |m: &mut PackageMeta, ()| Ok(m.codes().to_vec()))
        .method("set_color", |m: &mut PackageMeta, color: i64| {
            m.set_block_color(enum_arg::<BlockColor>(color)?)
                .map_err(LuaError::external)
        })
        .method("set_shape", |m: &mut PackageMeta, cells: Vec<i64>| {
            m.set_block_shape(&cells).map_err(LuaError::external)
        })
        .method("as_program", |m: &mut PackageMeta, ()| {
            m.mark_program().map_err(LuaError::external)
        })
}

fn color_channel(value: Option<i64>) -> LuaResult<u8> {
    let value = value.unwrap_or(255);
    u8::try_from(value)
        .map_err(|_| LuaError::external(format!("color channel {} is outside 0-255", value)))
}

fn sprite_node_binding() -> TypeBinding<SpriteNode> {
    TypeBinding::<SpriteNode>::new(NAMESPACE)
        .constructor("new", |_, ()| Ok(ScriptHandle::owning(SpriteNode::new())))
        .method("set_texture", |n: &mut SpriteNode, path: String| {
            n.set_texture(path);
            Ok(())
        })
        .method("get_texture", |n: &mut SpriteNode, ()| {
            Ok(n.texture().map(str::to_string))
        })
        .method("show", |n: &mut SpriteNode, ()| {
            n.show();
            Ok(())
        })
        .method("hide", |n: &mut SpriteNode, ()| {
            n.hide();
            Ok(())
        })
        .method("is_visible", |n: &mut SpriteNode, ()| Ok(n.is_visible()))
        .method("set_layer", |n: &mut SpriteNode, layer: i64| {
            n.set_layer(layer);
            Ok(())
        })
        .method("get_layer", |n: &mut SpriteNode, ()| Ok(n.layer()))
        .method("set_position", |n: &mut SpriteNode, (x, y): (f64, f64)| {
            n.set_position(x, y);
            Ok(())
        })
        .method("get_position", |n: &mut SpriteNode, ()| Ok(n.position()))
        .method(
            "set_color",
            |n: &mut SpriteNode, (r, g, b, a): (Option<i64>, Option<i64>, Option<i64>, Option<i64>)| {
                n.set_color(Color::rgba(
                    color_channel(r)?,
                    color_channel(g)?,
                    color_channel(b)?,
                    color_channel(a)?,
                ));
                Ok(())
            },
        )
        .method("get_color", |n: &mut SpriteNode, ()| {
            let c = n.color();
            Ok((c.r, c.g, c.b, c.a))
        })
        .method("add_tag", |n: &mut SpriteNode, tags: LuaVariadic<String>| {
            n.add_tags(tags.iter().cloned());
            Ok(())
        })
        .method("remove_tags", |n: &mut SpriteNode, tags: LuaVariadic<String>| {
            n.remove_tags(tags.iter());
            Ok(())
        })
        .method("has_tag", |n: &mut SpriteNode, tag: String| Ok(n.has_tag(&tag)))
        .method("has_parent", |n: &mut SpriteNode, ()| Ok(n.has_parent()))
        .method(
            "find_child_nodes_with_tags",
            |n: &mut SpriteNode, tags: Vec<String>| {
                let found = n.children_with_tags(&tags).map_err(LuaError::external)?;
                Ok(found
                    .iter()
                    .map(|child| ScriptHandle::new(Handle::wrap(child)))
                    .collect::<Vec<_>>())
            },
        )
        .handle_method("add_node", |_, this, child: LuaAnyUserData| {
            let node = child
                .borrow::<ScriptHandle<SpriteNode>>()?
                .handle()
                .unwrap()
                .map_err(LuaError::external)?;
            let parent = this.unwrap().map_err(LuaError::external)?;
            SpriteNode::add_child(&parent, node).map_err(LuaError::external)?;
            // The parent is the owner from now on.
            child.borrow_mut::<ScriptHandle<SpriteNode>>()?.release();
            Ok(())
        })
        .handle_method("remove_node", |_, this, child: LuaValue| {
            let node = handle_arg::<SpriteNode>(&child)?
                .unwrap()
                .map_err(LuaError::external)?;
            let parent = this.unwrap().map_err(LuaError::external)?;
            let Some(removed) =
                SpriteNode::remove_child(&parent, &node).map_err(LuaError::external)?
            else {
                return Ok(None);
            };
            let mut handle = Handle::wrap(&removed);
            handle.own().map_err(LuaError::external)?;
            Ok(Some(ScriptHandle::new(handle)))
        })
}

fn animation_binding() -> TypeBinding<Animation> {
    TypeBinding::<Animation>::new(NAMESPACE)
        .constructor("new", |_, path: String| {
            Ok(ScriptHandle::owning(Animation::new(path)))
        })
        .method("get_path", |a: &mut Animation, ()| Ok(a.path().to_string()))
        .method("get_state", |a: &mut Animation, ()| {
            Ok(a.state().map(str::to_string))
        })
        .method("get_frame", |a: &mut Animation, ()| Ok(a.frame()))
        .method("get_frame_count", |a: &mut Animation, ()| Ok(a.frame_count()))
        .method("get_playback", |a: &mut Animation, ()| Ok(a.playback().value()))
        .method("set_playback", |a: &mut Animation, mode: i64| {
            a.set_playback(enum_arg::<Playback>(mode)?);
            Ok(())
        })
        .method("is_finished", |a: &mut Animation, ()| Ok(a.is_finished()))
        .handle_method(
            "set_state",
            |lua, this, (name, frame_count): (String, u32)| {
                let change = this
                    .with_mut(|a| a.set_state(name, frame_count))
                    .map_err(LuaError::external)?;
                let services = services(lua)?;
                // The interrupt callback belonged to the old state: fire it, then drop it.
                services.dispatch(change.interrupted.into_iter().collect());
                services.bridge.release(&change.dropped);
                Ok(())
            },
        )
        .handle_method("update", |lua, this, frames: Option<u32>| {
            let events = this
                .with_mut(|a| a.advance(frames.unwrap_or(1)))
                .map_err(LuaError::external)?;
            services(lua)?.dispatch(events);
            Ok(())
        })
        .handle_method("interrupt", |lua, this, ()| {
            let event = this
                .with_mut(Animation::interrupt)
                .map_err(LuaError::external)?;
            services(lua)?.dispatch(event.into_iter().collect());
            Ok(())
        })
        .handle_method(
            "on_frame",
            |lua, this, (frame, function, do_once): (u32, LuaFunction, Option<bool>)| {
                let services = services(lua)?;
                let mode = FireMode::from_once_flag(do_once.unwrap_or(false));
                let id = services
                    .bridge
                    .register(lua, function, mode, Some(owner_of(this)?))?;
                this.with_mut(|a| a.on_frame(frame, id)).map_err(|e| {
                    services.bridge.release(&[id]);
                    LuaError::external(e)
                })
            },
        )
        .handle_method("on_complete", |lua, this, function: LuaFunction| {
            let services = services(lua)?;
            let id = services.bridge.register(
                lua,
                function,
                FireMode::Repeatable,
                Some(owner_of(this)?),
            )?;
            match this.with_mut(|a| a.on_complete(id)) {
                Ok(replaced) => {
                    services.bridge.release(&replaced.into_iter().collect::<Vec<_>>());
                    Ok(())
                }
                Err(e) => {
                    services.bridge.release(&[id]);
                    Err(LuaError::external(e))
                }
            }
        })
        .handle_method("on_interrupt", |lua, this, function: LuaFunction| {
            let services = services(lua)?;
            let id = services.bridge.register(
                lua,
                function,
                FireMode::Repeatable,
                Some(owner_of(this)?),
            )?;
            match this.with_mut(|a| a.on_interrupt(id)) {
                Ok(replaced) => {
                    services.bridge.release(&replaced.into_iter().collect::<Vec<_>>());
                    Ok(())
                }
                Err(e) => {
                    services.bridge.release(&[id]);
                    Err(LuaError::external(e))
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::test_support::TestEnvironment;
    use tactica_application::RuntimeSettings;
    use tactica_domain::{Entity, PackageKind, Rank, Team, share};

    const LOOPING_ATTACK: &str = r#"
        anim = Engine.Animation.new("hero.animation")
        anim:set_state("ATTACK", 6)
        anim:set_playback(Playback.Loop)
        hits = 0
    "#;

    #[test]
    fn test_one_shot_frame_callback_under_loop_fires_once() {
        let env = TestEnvironment::new();
        env.lua.load(LOOPING_ATTACK).exec().unwrap();
        env.lua
            .load(
                r#"
                anim:on_frame(5, function() hits = hits + 1 end, true)
                anim:update(12)
            "#,
            )
            .exec()
            .unwrap();
        let hits: i64 = env.lua.globals().get("hits").unwrap();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_repeatable_frame_callback_fires_every_pass() {
        let env = TestEnvironment::new();
        env.lua.load(LOOPING_ATTACK).exec().unwrap();
        env.lua
            .load(
                r#"
                anim:on_frame(5, function() hits = hits + 1 end)
                anim:update(12)
                assert(anim:get_frame() == 6)
                assert(not anim:is_finished())
            "#,
            )
            .exec()
            .unwrap();
        let hits: i64 = env.lua.globals().get("hits").unwrap();
        assert_eq!(hits, 2);
    }

    #[test]
    fn test_set_state_fires_interrupt_and_releases_slots() {
        let env = TestEnvironment::new();
        env.lua
            .load(
                r#"
                anim = Engine.Animation.new("hero.animation")
                anim:set_state("MOVE", 4)
                interrupted = false
                anim:on_frame(3, function() end)
                anim:on_interrupt(function() interrupted = true end)
                anim:update(1)
            "#,
            )
            .exec()
            .unwrap();
        assert_eq!(env.services.bridge.len(), 2);

        env.lua.load("anim:set_state('IDLE', 1)").exec().unwrap();
        let interrupted: bool = env.lua.globals().get("interrupted").unwrap();
        assert!(interrupted);
        assert!(env.services.bridge.is_empty());
        let state: String = env.lua.load("return anim:get_state()").eval().unwrap();
        assert_eq!(state, "IDLE");
    }

    #[test]
    fn test_on_complete_replaces_slot() {
        let env = TestEnvironment::new();
        env.lua
            .load(
                r#"
                done = 0
                anim = Engine.Animation.new("hero.animation")
                anim:set_state("IDLE", 2)
                anim:on_complete(function() done = done + 1 end)
                anim:on_complete(function() done = done + 10 end)
                anim:update(5)
            "#,
            )
            .exec()
            .unwrap();
        assert_eq!(env.services.bridge.len(), 1);
        let done: i64 = env.lua.globals().get("done").unwrap();
        assert_eq!(done, 10);
    }

    #[test]
    fn test_entity_animation_callbacks_die_with_entity() {
        let env = TestEnvironment::new();
        let entity = share(Entity::character("com.test.hero", Team::Red, Rank::V1));
        env.set_global("hero", ScriptHandle::new(Handle::wrap(&entity)));
        env.lua
            .load(
                r#"
                fired = false
                anim = hero:get_animation()
                anim:set_state("IDLE", 2)
                anim:on_complete(function() fired = true end)
            "#,
            )
            .exec()
            .unwrap();

        let animation = entity.lock().unwrap().animation().clone();
        let events = animation.lock().unwrap().advance(2);
        drop(animation);
        drop(entity);

        let report = env.services.dispatch(events);
        assert_eq!(report.skipped, 1);
        let fired: bool = env.lua.globals().get("fired").unwrap();
        assert!(!fired);
    }

    #[test]
    fn test_package_meta_methods() {
        let env = TestEnvironment::new();
        let meta = share(PackageMeta::new(PackageKind::Character));
        env.set_global("meta", ScriptHandle::new(Handle::wrap(&meta)));
        env.lua
            .load(
                r#"
                meta:declare_package_id("com.test.hero")
                meta:set_name("Hero")
                meta:set_description("A test hero")
                meta:set_preview_texture_path("preview.png")
                local card = meta:get_card_props()
                card.damage = 60
                assert(meta:get_package_id() == "com.test.hero")
            "#,
            )
            .exec()
            .unwrap();

        let meta = meta.lock().unwrap();
        assert_eq!(meta.package_id().unwrap().as_str(), "com.test.hero");
        assert_eq!(meta.name(), "Hero");
        assert_eq!(meta.preview_texture_path(), Some("preview.png"));
        assert_eq!(meta.card_props().lock().unwrap().damage, 60);
    }

    #[test]
    fn test_card_and_block_meta_methods() {
        let env = TestEnvironment::new();
        let card = share(PackageMeta::new(PackageKind::Card));
        let block = share(PackageMeta::new(PackageKind::Block));
        env.set_global("card", ScriptHandle::new(Handle::wrap(&card)));
        env.set_global("block", ScriptHandle::new(Handle::wrap(&block)));
        env.lua
            .load(
                r#"
                card:declare_package_id("com.test.card.cannon")
                card:set_icon_texture("icon.png")
                card:set_preview_texture("preview.png")
                card:set_codes({ "A", "*" })
                assert(#card:get_codes() == 2)
                local ok, err = pcall(function() card:set_codes({ "ab" }) end)
                assert(not ok and tostring(err):find("Invalid card code 'ab'", 1, true))

                block:set_color(Blocks.Red)
                block:set_shape({
                    0, 0, 0, 0, 0,
                    0, 1, 1, 1, 0,
                    0, 0, 1, 0, 0,
                    0, 0, 0, 0, 0,
                    0, 0, 0, 0, 0,
                })
                block:as_program()
                local ok, err = pcall(function() block:set_shape({ 1, 1 }) end)
                assert(not ok and tostring(err):find("needs 25 cells, got 2", 1, true))
                local ok, err = pcall(function() block:set_codes({ "A" }) end)
                assert(not ok and tostring(err):find("set_codes is only available to card", 1, true))
            "#,
            )
            .exec()
            .unwrap();

        let card = card.lock().unwrap();
        assert_eq!(card.codes(), ["A", "*"]);
        assert_eq!(card.icon_texture_path(), Some("icon.png"));
        assert_eq!(card.preview_texture_path(), Some("preview.png"));
        let block = block.lock().unwrap();
        assert_eq!(block.block().color, BlockColor::Red);
        assert_eq!(block.block().shape.iter().filter(|c| **c).count(), 4);
        assert!(block.block().is_program);
    }

    #[test]
    fn test_sprite_nodes_from_lua() {
        let env = TestEnvironment::new();
        let entity = share(Entity::character("com.test.hero", Team::Red, Rank::V1));
        env.set_global("hero", ScriptHandle::new(Handle::wrap(&entity)));
        env.lua
            .load(
                r#"
                local root = hero:sprite()
                shadow = Engine.SpriteNode.new()
                shadow:set_texture("shadow.png")
                shadow:add_tag("shadow", "fx")
                shadow:set_color(0, 0, 0, 128)
                shadow:set_position(2.5, -1)
                assert(tostring(shadow) == "SpriteNode (owned)")
                root:add_node(shadow)
                assert(tostring(shadow) == "SpriteNode (weak)")
                assert(shadow:has_parent())

                local ok, err = pcall(function() shadow:add_node(root) end)
                assert(not ok and tostring(err):find("own subtree", 1, true))

                local found = root:find_child_nodes_with_tags({ "fx" })
                assert(#found == 1 and found[1] == shadow)
                local r, g, b, a = shadow:get_color()
                assert(r == 0 and a == 128)
                local x, y = shadow:get_position()
                assert(x == 2.5 and y == -1)
            "#,
            )
            .exec()
            .unwrap();

        let sprite = entity.lock().unwrap().sprite_node().clone();
        assert_eq!(sprite.lock().unwrap().children().len(), 1);

        env.lua
            .load(
                r#"
                detached = hero:sprite():remove_node(shadow)
                assert(tostring(detached) == "SpriteNode (owned)")
                assert(not detached:has_parent())
            "#,
            )
            .exec()
            .unwrap();
        assert!(sprite.lock().unwrap().children().is_empty());
        drop(sprite);

        // Attached nodes go away with the entity.
        env.lua.load("hero:sprite():add_node(detached)").exec().unwrap();
        drop(entity);
        let text: String = env.lua.load("return tostring(shadow)").eval().unwrap();
        assert_eq!(text, "SpriteNode (expired)");
    }

    #[test]
    fn test_invalid_package_id_raises() {
        let env = TestEnvironment::new();
        let meta = share(PackageMeta::new(PackageKind::Character));
        env.set_global("meta", ScriptHandle::new(Handle::wrap(&meta)));
        let err = env
            .lua
            .load("meta:declare_package_id('not valid')")
            .exec()
            .unwrap_err();
        assert!(err.to_string().contains("Invalid package id 'not valid'"));
    }

    #[test]
    fn test_engine_functions() {
        let env = TestEnvironment::with_settings(RuntimeSettings::default().with_rand_seed(1234));
        let texture = env.dir.path().join("hero.png");
        std::fs::write(&texture, b"png").unwrap();
        env.set_global("texture", texture.display().to_string());

        let (seed, loaded, missing, input): (u32, bool, bool, bool) = env
            .lua
            .load(
                r#"
                Engine.play_audio("hit.ogg", AudioPriority.High)
                return Engine.get_rand_seed(),
                    Engine.load_texture(texture),
                    Engine.load_audio("/nonexistent/hit.ogg"),
                    Engine.input_has(Input.Pressed.Shoot)
            "#,
            )
            .set_name("@engine.lua")
            .eval()
            .unwrap();
        assert_eq!(seed, 1234);
        assert!(loaded);
        assert!(!missing);
        assert!(!input);

        let diagnostics = env.diagnostics.snapshot();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Runtime);
        assert!(diagnostics[0].message.starts_with("Failed to load audio /nonexistent/hit.ogg"));
    }
}
