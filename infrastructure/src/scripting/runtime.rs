//! Lua script runtime: the concrete [`ScriptRuntimePort`].
//!
//! `LuaScriptRuntime` owns the loader (and through it every environment) and
//! the callback bridge. Each module runs in its own sandboxed Lua 5.4 state;
//! the binding tables are built once and installed into every state.

use mlua::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tactica_application::{
    DiagnosticSink, DispatchReport, HostServicesPort, NullHostServices, RuntimeError,
    RuntimeSettings, ScriptRuntimePort,
};
use tactica_domain::{
    ApiSurface, CallbackId, DependencyGraph, DiagnosticKind, Entity, Field, Handle, Mob,
    PackageKind, PackageSummary, ScriptDiagnostic, Shared,
};
use tracing::{debug, info};

use super::bindings::battle_api::entity_callbacks;
use super::bindings::{BindingError, standard_registry};
use super::environment::RuntimeServices;
use super::guards::{describe_lua_error, split_location};
use super::handle::ScriptHandle;
use super::loader::{RuntimeShared, ScriptModule};

/// Lua 5.4 implementation of [`ScriptRuntimePort`].
pub struct LuaScriptRuntime {
    shared: Arc<RuntimeShared>,
}

impl LuaScriptRuntime {
    /// Create a runtime with a headless host.
    pub fn new(
        settings: RuntimeSettings,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, BindingError> {
        Self::with_host_services(settings, diagnostics, Arc::new(NullHostServices))
    }

    /// Create a runtime whose `Engine.*` asset, audio and input calls go to `host`.
    ///
    /// The binding tables are installed into a scratch state first, so a
    /// broken binding fails here rather than on the first module load.
    pub fn with_host_services(
        settings: RuntimeSettings,
        diagnostics: Arc<dyn DiagnosticSink>,
        host: Arc<dyn HostServicesPort>,
    ) -> Result<Self, BindingError> {
        let bindings = standard_registry()?;
        bindings.verify()?;
        let services = Arc::new(RuntimeServices::new(
            settings,
            Arc::new(bindings),
            diagnostics,
            host,
        ));
        Ok(Self {
            shared: RuntimeShared::new(services),
        })
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.shared.services().settings
    }

    /// Loaded (or failed) module for the package in `dir`.
    pub fn module(&self, dir: &Path, kind: PackageKind) -> Result<Arc<ScriptModule>, RuntimeError> {
        self.shared.load_module(dir, kind)
    }

    fn ensure_running(&self) -> Result<(), RuntimeError> {
        if self.shared.contexts().is_shut_down() {
            Err(RuntimeError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Call the global `hook` of `module`. A missing hook is an error only when `required`.
    fn call_hook<A: IntoLuaMulti>(
        &self,
        module: &ScriptModule,
        hook: &str,
        args: A,
        required: bool,
    ) -> Result<(), RuntimeError> {
        let script_error = |message: String| RuntimeError::Script {
            context: format!("{} in {}", hook, module.label()),
            message,
        };
        let lua = module.lua()?;
        let function = match lua.globals().raw_get::<LuaValue>(hook) {
            Ok(LuaValue::Function(function)) => function,
            Ok(_) if required => return Err(script_error(format!("{} is not defined", hook))),
            Ok(_) => {
                debug!(module = %module.label(), hook, "Hook not defined; skipped");
                return Ok(());
            }
            Err(e) => return Err(script_error(describe_lua_error(&e))),
        };

        function.call::<()>(args).map_err(|e| {
            let message = describe_lua_error(&e);
            let (location, _) = split_location(&message);
            self.shared.services().report(
                &ScriptDiagnostic::new(DiagnosticKind::Runtime, message.clone())
                    .at(location)
                    .with_context(format!("{} in {}", hook, module.label())),
            );
            script_error(message)
        })
    }
}

impl Drop for LuaScriptRuntime {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl ScriptRuntimePort for LuaScriptRuntime {
    fn is_available(&self) -> bool {
        true
    }

    fn load_package(&self, dir: &Path, kind: PackageKind) -> Result<PackageSummary, RuntimeError> {
        self.shared.load_package(dir, kind)
    }

    fn define_character(&self, fqn: &str, dir: &Path) -> Result<bool, RuntimeError> {
        self.shared.define_character(fqn, dir)
    }

    fn define_library(&self, fqn: &str, dir: &Path) -> Result<bool, RuntimeError> {
        self.shared.define_library(fqn, dir)
    }

    fn requires_character(&self, fqn: &str) -> Result<(), RuntimeError> {
        self.shared.requires_character(fqn)
    }

    fn build_mob(&self, dir: &Path, mob: &Shared<Mob>) -> Result<(), RuntimeError> {
        let module = self.shared.load_module(dir, PackageKind::Mob)?;
        module.result()?;
        self.call_hook(
            &module,
            "package_build",
            ScriptHandle::new(Handle::wrap(mob)),
            true,
        )
    }

    fn init_character(&self, fqn: &str, entity: &Shared<Entity>) -> Result<(), RuntimeError> {
        self.ensure_running()?;
        if self.settings().is_builtin_character(fqn) {
            return Ok(());
        }
        let module = self.shared.character_module(fqn)?;
        self.call_hook(
            &module,
            "character_init",
            ScriptHandle::new(Handle::wrap(entity)),
            false,
        )
    }

    fn release_entities(&self, entities: &[Shared<Entity>]) {
        let released: Vec<CallbackId> = entities.iter().flat_map(entity_callbacks).collect();
        self.shared.services().bridge.release(&released);
        if !entities.is_empty() {
            debug!(
                removed = entities.len(),
                released = released.len(),
                "Entities dropped from the field"
            );
        }
    }

    fn update(&self, field: &Shared<Field>, frames: u32) -> Result<DispatchReport, RuntimeError> {
        self.ensure_running()?;
        let field = Handle::wrap(field);
        let events = field.with_mut(|f| f.update(frames))??;
        // The field stays unlocked while callbacks run; they may spawn or erase.
        let report = self.shared.services().dispatch(events);

        let removed = field.with_mut(Field::remove_deleted)?;
        self.release_entities(&removed);
        Ok(report)
    }

    fn dependencies(&self) -> DependencyGraph {
        self.shared.dependencies()
    }

    fn api_surface(&self) -> ApiSurface {
        self.shared.services().bindings.api_surface()
    }

    fn shutdown(&self) -> Result<(), RuntimeError> {
        let closed = self.shared.shutdown();
        info!(closed, "Script runtime shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tactica_application::{
        CollectingDiagnostics, LoadPackagesUseCase, SpawnMobError, SpawnMobInput, SpawnMobUseCase,
    };
    use tactica_domain::{BlockColor, Rank, Team, share};
    use tempfile::TempDir;

    const SHARED_UTIL: &str = r#"
        function package_init(meta)
            meta:declare_package_id("shared_util")
            meta:set_name("Shared utilities")
        end

        function stamp(entity, tag)
            entity:set_name(entity:get_name() .. tag)
        end
    "#;

    const HERO: &str = r#"
        include("shared_util")

        function package_init(meta)
            meta:declare_package_id("com.test.hero")
            meta:set_name("Hero")
            meta:set_description("Two spells, one self-erasing")
        end

        function character_init(hero)
            hero:set_name("Hero")
            hero:set_health(100)
            local field = hero:get_field()
            local x, y = hero:get_tile()
            for i = 1, 2 do
                local spell = Battle.Hitbox.new(Team.Red)
                spell:set_hit_props(make_hit_props(10, Hit.Flinch, Element.None))
                spell:set_callbacks(nil, function(self, other)
                    stamp(other, tostring(i))
                    if i == 1 then
                        self:erase()
                    end
                end)
                field:spawn(spell, x, y)
            end
        end
    "#;

    const MOB: &str = r#"
        function package_build(mob)
            mob:set_background("bg.png")
            local spawner = mob:create_spawner("com.test.hero", Rank.V1)
            spawner:spawn_at(2, 1)
        end
    "#;

    struct Fixture {
        dir: TempDir,
        diagnostics: Arc<CollectingDiagnostics>,
        runtime: Arc<LuaScriptRuntime>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let diagnostics = Arc::new(CollectingDiagnostics::new());
            let settings = RuntimeSettings::default()
                .with_mods_root(dir.path())
                .with_rand_seed(99);
            let runtime =
                Arc::new(LuaScriptRuntime::new(settings, diagnostics.clone()).unwrap());
            Self {
                dir,
                diagnostics,
                runtime,
            }
        }

        fn package(&self, relative: &str, entry: &str) -> PathBuf {
            let dir = self.dir.path().join(relative);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("entry.lua"), entry).unwrap();
            dir
        }

        fn content(&self) -> PathBuf {
            self.package("libs/shared_util", SHARED_UTIL);
            self.package("enemies/hero", HERO);
            self.package("mobs/arena", MOB)
        }

        fn load_all(&self) {
            let output = LoadPackagesUseCase::new(
                self.runtime.clone(),
                self.runtime.settings().clone(),
            )
            .execute();
            assert!(output.failures.is_empty(), "{:?}", output.failures);
        }
    }

    #[test]
    fn test_package_loads_once_per_path() {
        let fx = Fixture::new();
        let dir = fx.package(
            "enemies/counter",
            "loads = (loads or 0) + 1\ndeclare_package_id('com.test.counter')",
        );
        let first = fx.runtime.module(&dir, PackageKind::Character).unwrap();
        fx.runtime
            .load_package(&dir, PackageKind::Character)
            .unwrap();
        let second = fx.runtime.module(&dir, PackageKind::Character).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let loads: i64 = first.lua().unwrap().globals().get("loads").unwrap();
        assert_eq!(loads, 1);
    }

    #[test]
    fn test_package_scan_records_dependencies() {
        let fx = Fixture::new();
        fx.content();
        fx.load_all();

        let graph = fx.runtime.dependencies();
        assert_eq!(
            graph.dependencies_of("com.test.hero"),
            Some(["shared_util".to_string()].as_slice())
        );
        let hero = fx
            .runtime
            .module(&fx.dir.path().join("enemies/hero"), PackageKind::Character)
            .unwrap();
        let notes: LuaValue = hero.lua().unwrap().globals().get("__dependencies").unwrap();
        assert_eq!(notes, LuaValue::Nil);
        assert_eq!(hero.summary().description, "Two spells, one self-erasing");
    }

    #[test]
    fn test_card_and_block_packages_load_their_metadata() {
        let fx = Fixture::new();
        let card = fx.package(
            "cards/cannon",
            r#"
            function package_init(meta)
                meta:declare_package_id("com.test.card.cannon")
                meta:set_name("Cannon")
                meta:set_codes({ "A", "B", "*" })
                meta:get_card_props().damage = 40
            end
            "#,
        );
        let block = fx.package(
            "blocks/charge",
            r#"
            function package_init(meta)
                meta:declare_package_id("com.test.block.charge")
                meta:set_color(Blocks.Pink)
                meta:set_shape({
                    1, 1, 0, 0, 0,
                    0, 0, 0, 0, 0,
                    0, 0, 0, 0, 0,
                    0, 0, 0, 0, 0,
                    0, 0, 0, 0, 0,
                })
            end
            "#,
        );
        fx.load_all();

        let module = fx.runtime.module(&card, PackageKind::Card).unwrap();
        assert_eq!(module.summary().name, "Cannon");
        {
            let meta = module.environment().meta.lock().unwrap();
            assert_eq!(meta.codes(), ["A", "B", "*"]);
            assert_eq!(meta.card_props().lock().unwrap().damage, 40);
        }
        let module = fx.runtime.module(&block, PackageKind::Block).unwrap();
        let meta = module.environment().meta.lock().unwrap();
        assert_eq!(meta.block().color, BlockColor::Pink);
        assert_eq!(meta.block().shape.iter().filter(|c| **c).count(), 2);
    }

    #[test]
    fn test_card_setters_fail_a_character_load() {
        let fx = Fixture::new();
        let dir = fx.package(
            "enemies/confused",
            "function package_init(meta) meta:set_codes({ 'A' }) end",
        );
        let err = fx
            .runtime
            .load_package(&dir, PackageKind::Character)
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("set_codes is only available to card packages, not character"),
            "{}",
            err
        );
    }

    #[test]
    fn test_requires_character_failure_names_fqn() {
        let fx = Fixture::new();
        let dir = fx.package("enemies/broken", "local x = nil\nx.boom()");
        assert!(fx.runtime.define_character("com.test.broken", &dir).unwrap());
        assert!(!fx.runtime.define_character("com.test.broken", &dir).unwrap());

        let err = fx.runtime.requires_character("com.test.broken").unwrap_err();
        assert!(matches!(&err, RuntimeError::CharacterLoadFailed { fqn, .. } if fqn == "com.test.broken"));
        assert!(err.to_string().contains("attempt to index"));
        assert_eq!(fx.diagnostics.len(), 1);
    }

    #[test]
    fn test_spawn_fires_collision_callbacks_in_order() {
        let fx = Fixture::new();
        let mob_dir = fx.content();
        fx.load_all();

        let field = share(Field::default());
        let output = SpawnMobUseCase::new(fx.runtime.clone())
            .execute(SpawnMobInput::new(&mob_dir, field.clone()))
            .unwrap();
        assert_eq!(output.spawned.len(), 1);
        assert_eq!(output.spawned[0].tile, (2, 1));
        assert_eq!(output.background.as_deref(), Some("bg.png"));
        assert_eq!(field.lock().unwrap().len(), 3);

        let report = fx.runtime.update(&field, 1).unwrap();
        assert_eq!(report.fired, 2);
        assert!(report.is_clean(), "{:?}", report.failures);

        let field_ref = field.lock().unwrap();
        assert_eq!(field_ref.len(), 2);
        let hero = field_ref.find(output.spawned[0].id).unwrap();
        drop(field_ref);
        let hero = hero.lock().unwrap();
        assert_eq!(hero.name(), "Hero12");
        assert_eq!(hero.team(), Team::Blue);
        assert_eq!(hero.rank(), Rank::V1);
        assert_eq!(hero.health(), 80);
    }

    #[test]
    fn test_spawn_aborts_on_unknown_character() {
        let fx = Fixture::new();
        let mob_dir = fx.package(
            "mobs/ghosts",
            r#"
            function package_build(mob)
                mob:create_spawner("com.builtins.char.mettaur"):spawn_at(0, 0)
                mob:create_spawner("com.test.ghost", Rank.V2):spawn_at(1, 0)
            end
            "#,
        );
        let field = share(Field::default());
        let err = SpawnMobUseCase::new(fx.runtime.clone())
            .execute(SpawnMobInput::new(&mob_dir, field.clone()))
            .unwrap_err();
        assert!(matches!(err, SpawnMobError::MissingCharacter { ref fqn, .. } if fqn == "com.test.ghost"));
        assert!(field.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_init_leaves_field_and_callbacks_clean() {
        let fx = Fixture::new();
        fx.content();
        fx.package(
            "enemies/grumpy",
            r#"
            declare_package_id("com.test.grumpy")
            function character_init(e)
                error("refuses to spawn")
            end
            "#,
        );
        let mob_dir = fx.package(
            "mobs/mixed",
            r#"
            function package_build(mob)
                mob:create_spawner("com.test.hero", Rank.V1):spawn_at(2, 1)
                mob:create_spawner("com.test.grumpy", Rank.V1):spawn_at(4, 1)
            end
            "#,
        );
        fx.load_all();

        let field = share(Field::default());
        let err = SpawnMobUseCase::new(fx.runtime.clone())
            .execute(SpawnMobInput::new(&mob_dir, field.clone()))
            .unwrap_err();
        assert!(matches!(err, SpawnMobError::Init { ref fqn, .. } if fqn == "com.test.grumpy"));
        assert!(field.lock().unwrap().is_empty());
        assert!(fx.runtime.shared.services().bridge.is_empty());
    }

    #[test]
    fn test_build_mob_requires_hook() {
        let fx = Fixture::new();
        let mob_dir = fx.package("mobs/empty", "x = 1");
        let mob = share(Mob::new());
        let err = fx.runtime.build_mob(&mob_dir, &mob).unwrap_err();
        assert!(err.to_string().contains("package_build is not defined"));
    }

    #[test]
    fn test_init_character_reports_script_errors() {
        let fx = Fixture::new();
        let dir = fx.package(
            "enemies/grumpy",
            "function character_init(e)\n  error('refuses to spawn')\nend",
        );
        fx.runtime.define_character("com.test.grumpy", &dir).unwrap();
        let entity = share(Entity::character("com.test.grumpy", Team::Blue, Rank::V1));

        let err = fx
            .runtime
            .init_character("com.test.grumpy", &entity)
            .unwrap_err();
        assert!(matches!(&err, RuntimeError::Script { message, .. } if message.ends_with("refuses to spawn")));
        let diagnostics = fx.diagnostics.snapshot();
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Runtime);
        assert_eq!(diagnostics[0].location.as_ref().unwrap().line, Some(2));

        fx.runtime
            .init_character("com.builtins.char.canodumb", &entity)
            .unwrap();
    }

    #[test]
    fn test_shutdown_stops_everything() {
        let fx = Fixture::new();
        let mob_dir = fx.content();
        fx.load_all();
        let field = share(Field::default());
        SpawnMobUseCase::new(fx.runtime.clone())
            .execute(SpawnMobInput::new(&mob_dir, field.clone()))
            .unwrap();

        fx.runtime.shutdown().unwrap();
        fx.runtime.shutdown().unwrap();
        assert_eq!(
            fx.runtime.requires_character("com.test.hero"),
            Err(RuntimeError::ShutDown)
        );
        assert_eq!(
            fx.runtime.update(&field, 1).unwrap_err(),
            RuntimeError::ShutDown
        );
        assert!(matches!(
            fx.runtime.load_package(&mob_dir, PackageKind::Mob),
            Err(RuntimeError::ShutDown)
        ));
    }

    #[test]
    fn test_api_surface_lists_bindings() {
        let fx = Fixture::new();
        let surface = fx.runtime.api_surface();
        assert!(surface.find_type("Battle.Entity").is_some());
        assert!(
            surface
                .functions
                .iter()
                .any(|f| f.namespace.is_empty() && f.name == "include")
        );
        assert!(surface.enums.iter().any(|e| e.path == "Team"));
        assert!(fx.runtime.is_available());
    }
}
