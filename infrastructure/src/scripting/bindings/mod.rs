//! Binding registry: the script-visible API surface.
//!
//! Native types, namespace functions and enum tables are registered once,
//! when the runtime is built, and installed into every script environment
//! afterwards. Registration is where conflicts are caught: two types with
//! the same name, a function shadowing a namespace, and so on all fail with
//! a [`BindingError`] before any script runs.
//!
//! Each bound type gets a [`TypeBinding`] holding its property accessors and
//! methods. Lua only ever sees [`ScriptHandle`](super::handle::ScriptHandle)
//! userdata; its metamethods look members up here.

pub mod battle_api;
pub mod engine_api;
pub mod enums_api;

use mlua::prelude::*;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tactica_domain::{
    ApiSurface, EnumDescriptor, FunctionDescriptor, Handle, NativeType, PropertyDescriptor,
    TypeDescriptor,
};
use thiserror::Error;

use super::guards::{guard_table, read_only_table};
use super::handle::ScriptHandle;

/// Errors raised while building the API surface.
///
/// These are fatal: a runtime whose bindings do not register cleanly is never
/// handed to a caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("Type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Function '{0}' is already registered")]
    DuplicateFunction(String),

    #[error("Enum '{0}' is already registered")]
    DuplicateEnum(String),

    #[error("'{name}' is already registered as a {existing}")]
    NamespaceConflict { name: String, existing: String },

    #[error("Failed to install bindings: {0}")]
    Lua(String),
}

pub type Getter<T> = Box<dyn Fn(&Lua, &T) -> LuaResult<LuaValue> + Send + Sync>;
pub type Setter<T> = Box<dyn Fn(&Lua, &mut T, LuaValue) -> LuaResult<()> + Send + Sync>;

/// Free function or constructor callable from script.
pub type NativeFunction =
    Arc<dyn Fn(&Lua, LuaMultiValue) -> LuaResult<LuaMultiValue> + Send + Sync>;

type LockedMethod<T> =
    Arc<dyn Fn(&Lua, &mut T, LuaMultiValue) -> LuaResult<LuaMultiValue> + Send + Sync>;
type HandleMethod<T> =
    Arc<dyn Fn(&Lua, &Handle<T>, LuaMultiValue) -> LuaResult<LuaMultiValue> + Send + Sync>;

struct Property<T> {
    get: Getter<T>,
    set: Option<Setter<T>>,
}

enum MethodKind<T: NativeType> {
    /// Runs with the target locked.
    Locked(LockedMethod<T>),
    /// Gets the handle itself; used by methods that call back into script
    /// or hand the target to other native code.
    Handle(HandleMethod<T>),
}

impl<T: NativeType> Clone for MethodKind<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Locked(f) => Self::Locked(Arc::clone(f)),
            Self::Handle(f) => Self::Handle(Arc::clone(f)),
        }
    }
}

impl<T: NativeType> MethodKind<T> {
    fn into_function(self, lua: &Lua) -> LuaResult<LuaFunction> {
        lua.create_function(move |lua, (receiver, args): (LuaValue, LuaMultiValue)| {
            let handle = receiver_handle::<T>(&receiver)?;
            match &self {
                Self::Locked(f) => handle
                    .with_mut(|target| f(lua, target, args))
                    .map_err(LuaError::external)?,
                Self::Handle(f) => f(lua, &handle, args),
            }
        })
    }
}

/// Clone the handle out of a method receiver, dropping the userdata borrow.
fn receiver_handle<T: NativeType>(receiver: &LuaValue) -> LuaResult<Handle<T>> {
    let wrong_receiver = || {
        LuaError::external(format!(
            "expected {} receiver; call methods with ':'",
            T::TYPE_NAME
        ))
    };
    match receiver {
        LuaValue::UserData(ud) => ud
            .borrow::<ScriptHandle<T>>()
            .map(|h| h.handle().clone())
            .map_err(|_| wrong_receiver()),
        _ => Err(wrong_receiver()),
    }
}

/// What a member name resolves to on a bound type.
pub enum Member<'a, T> {
    Property {
        get: &'a Getter<T>,
        set: Option<&'a Setter<T>>,
    },
    Method,
}

/// Accessors, methods and constructors of one native type.
pub struct TypeBinding<T: NativeType> {
    namespace: String,
    properties: BTreeMap<String, Property<T>>,
    methods: BTreeMap<String, MethodKind<T>>,
    constructors: BTreeMap<String, NativeFunction>,
}

impl<T: NativeType> TypeBinding<T> {
    /// Start a binding for `T` published under `namespace` (e.g. `Battle`).
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            properties: BTreeMap::new(),
            methods: BTreeMap::new(),
            constructors: BTreeMap::new(),
        }
    }

    /// Read-only property.
    pub fn property<R, G>(mut self, name: &str, get: G) -> Self
    where
        R: IntoLua + 'static,
        G: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.properties.insert(
            name.to_string(),
            Property {
                get: Box::new(move |lua, target| get(target).into_lua(lua)),
                set: None,
            },
        );
        self
    }

    /// Read-write property.
    pub fn property_rw<R, V, G, S>(mut self, name: &str, get: G, set: S) -> Self
    where
        R: IntoLua + 'static,
        V: FromLua + 'static,
        G: Fn(&T) -> R + Send + Sync + 'static,
        S: Fn(&mut T, V) -> LuaResult<()> + Send + Sync + 'static,
    {
        self.properties.insert(
            name.to_string(),
            Property {
                get: Box::new(move |lua, target| get(target).into_lua(lua)),
                set: Some(Box::new(move |lua, target, value| {
                    set(target, V::from_lua(value, lua)?)
                })),
            },
        );
        self
    }

    /// Method that runs with the target locked.
    pub fn method<A, R, F>(mut self, name: &str, f: F) -> Self
    where
        A: FromLuaMulti + 'static,
        R: IntoLuaMulti + 'static,
        F: Fn(&mut T, A) -> LuaResult<R> + Send + Sync + 'static,
    {
        let method: LockedMethod<T> = Arc::new(move |lua, target, args| {
            f(target, A::from_lua_multi(args, lua)?)?.into_lua_multi(lua)
        });
        self.methods
            .insert(name.to_string(), MethodKind::Locked(method));
        self
    }

    /// Method that receives the handle instead of a locked target.
    ///
    /// Use this when the method dispatches script callbacks or passes the
    /// target on to native code that locks it itself.
    pub fn handle_method<A, R, F>(mut self, name: &str, f: F) -> Self
    where
        A: FromLuaMulti + 'static,
        R: IntoLuaMulti + 'static,
        F: Fn(&Lua, &Handle<T>, A) -> LuaResult<R> + Send + Sync + 'static,
    {
        let method: HandleMethod<T> = Arc::new(move |lua, handle, args| {
            f(lua, handle, A::from_lua_multi(args, lua)?)?.into_lua_multi(lua)
        });
        self.methods
            .insert(name.to_string(), MethodKind::Handle(method));
        self
    }

    /// Function on the type table, e.g. `Battle.HitProps.new(...)`.
    pub fn constructor<A, R, F>(mut self, name: &str, f: F) -> Self
    where
        A: FromLuaMulti + 'static,
        R: IntoLuaMulti + 'static,
        F: Fn(&Lua, A) -> LuaResult<R> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_string(), native_function(f));
        self
    }

    pub fn qualified_name(&self) -> String {
        tactica_domain::scripting::binding::qualify(&self.namespace, T::TYPE_NAME)
    }

    pub fn member(&self, name: &str) -> Option<Member<'_, T>> {
        if let Some(property) = self.properties.get(name) {
            return Some(Member::Property {
                get: &property.get,
                set: property.set.as_ref(),
            });
        }
        self.methods.get(name).map(|_| Member::Method)
    }

    /// The Lua function for method `name` in this environment.
    ///
    /// Created on first use and cached in the environment's registry, so
    /// `entity.get_name == entity.get_name` holds in script.
    pub fn method_function(&self, lua: &Lua, name: &str) -> LuaResult<LuaFunction> {
        let key = format!("tactica.methods.{}", T::TYPE_NAME);
        let cache = match lua.named_registry_value::<LuaValue>(&key)? {
            LuaValue::Table(cache) => cache,
            _ => {
                let cache = lua.create_table()?;
                lua.set_named_registry_value(&key, cache.clone())?;
                cache
            }
        };
        if let LuaValue::Function(function) = cache.raw_get::<LuaValue>(name)? {
            return Ok(function);
        }

        let method = self.methods.get(name).cloned().ok_or_else(|| {
            LuaError::external(format!("{} has no method '{}'", T::TYPE_NAME, name))
        })?;
        let function = method.into_function(lua)?;
        cache.raw_set(name, function.clone())?;
        Ok(function)
    }

    fn descriptor(&self) -> TypeDescriptor {
        let mut descriptor = TypeDescriptor::new(&self.namespace, T::TYPE_NAME);
        descriptor.constructors = self.constructors.keys().cloned().collect();
        descriptor.properties = self
            .properties
            .iter()
            .map(|(name, p)| PropertyDescriptor {
                name: name.clone(),
                writable: p.set.is_some(),
            })
            .collect();
        descriptor.methods = self.methods.keys().cloned().collect();
        descriptor
    }
}

/// Type-erased view of a [`TypeBinding`] used while installing.
trait TypeEntry: Send + Sync {
    fn qualified_name(&self) -> String;
    fn descriptor(&self) -> TypeDescriptor;
    fn create_table(&self, lua: &Lua) -> LuaResult<LuaTable>;
}

impl<T: NativeType> TypeEntry for TypeBinding<T> {
    fn qualified_name(&self) -> String {
        TypeBinding::qualified_name(self)
    }

    fn descriptor(&self) -> TypeDescriptor {
        TypeBinding::descriptor(self)
    }

    fn create_table(&self, lua: &Lua) -> LuaResult<LuaTable> {
        let table = lua.create_table()?;
        for (name, constructor) in &self.constructors {
            table.raw_set(name.as_str(), create_native(lua, constructor)?)?;
        }
        Ok(table)
    }
}

/// Wrap a typed closure as a [`NativeFunction`].
pub fn native_function<A, R, F>(f: F) -> NativeFunction
where
    A: FromLuaMulti + 'static,
    R: IntoLuaMulti + 'static,
    F: Fn(&Lua, A) -> LuaResult<R> + Send + Sync + 'static,
{
    Arc::new(move |lua, args| f(lua, A::from_lua_multi(args, lua)?)?.into_lua_multi(lua))
}

fn create_native(lua: &Lua, function: &NativeFunction) -> LuaResult<LuaFunction> {
    let function = Arc::clone(function);
    lua.create_function(move |lua, args: LuaMultiValue| function(lua, args))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameKind {
    Namespace,
    Type,
    Function,
    Enum,
}

impl NameKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Type => "type",
            Self::Function => "function",
            Self::Enum => "enum",
        }
    }
}

struct FunctionEntry {
    namespace: String,
    name: String,
    function: NativeFunction,
}

/// Every type, function and enum exposed to scripts.
#[derive(Default)]
pub struct BindingRegistry {
    bindings: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    types: Vec<Arc<dyn TypeEntry>>,
    functions: Vec<FunctionEntry>,
    enums: Vec<EnumDescriptor>,
    /// Claimed dotted paths; prefixes of claimed paths are namespaces.
    names: BTreeMap<String, NameKind>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type<T: NativeType>(
        &mut self,
        binding: TypeBinding<T>,
    ) -> Result<(), BindingError> {
        let qualified = binding.qualified_name();
        if self.bindings.contains_key(&TypeId::of::<T>()) {
            return Err(BindingError::DuplicateType(qualified));
        }
        self.claim(&qualified, NameKind::Type)?;

        let binding = Arc::new(binding);
        self.bindings
            .insert(TypeId::of::<T>(), binding.clone() as Arc<dyn Any + Send + Sync>);
        self.types.push(binding);
        Ok(())
    }

    /// Register `namespace.name`; an empty namespace makes it a global.
    pub fn register_function<A, R, F>(
        &mut self,
        namespace: &str,
        name: &str,
        f: F,
    ) -> Result<(), BindingError>
    where
        A: FromLuaMulti + 'static,
        R: IntoLuaMulti + 'static,
        F: Fn(&Lua, A) -> LuaResult<R> + Send + Sync + 'static,
    {
        let qualified = tactica_domain::scripting::binding::qualify(namespace, name);
        self.claim(&qualified, NameKind::Function)?;
        self.functions.push(FunctionEntry {
            namespace: namespace.to_string(),
            name: name.to_string(),
            function: native_function(f),
        });
        Ok(())
    }

    /// Register a read-only enum table at dotted `path` (e.g. `Input.Pressed`).
    pub fn register_enum(
        &mut self,
        path: &str,
        entries: &[(&str, i64)],
    ) -> Result<(), BindingError> {
        self.claim(path, NameKind::Enum)?;
        self.enums.push(EnumDescriptor {
            path: path.to_string(),
            entries: entries
                .iter()
                .map(|(label, value)| (label.to_string(), *value))
                .collect(),
        });
        Ok(())
    }

    pub fn type_binding<T: NativeType>(&self) -> Option<Arc<TypeBinding<T>>> {
        self.bindings
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|binding| binding.downcast::<TypeBinding<T>>().ok())
    }

    fn claim(&mut self, path: &str, kind: NameKind) -> Result<(), BindingError> {
        let segments: Vec<&str> = path.split('.').collect();
        let prefixes: Vec<String> = (1..segments.len())
            .map(|i| segments[..i].join("."))
            .collect();

        for prefix in &prefixes {
            if let Some(existing) = self.names.get(prefix)
                && *existing != NameKind::Namespace
            {
                return Err(BindingError::NamespaceConflict {
                    name: prefix.clone(),
                    existing: existing.as_str().to_string(),
                });
            }
        }

        match self.names.get(path) {
            None => {}
            Some(existing) if *existing == kind => {
                return Err(match kind {
                    NameKind::Type => BindingError::DuplicateType(path.to_string()),
                    NameKind::Function => BindingError::DuplicateFunction(path.to_string()),
                    NameKind::Enum => BindingError::DuplicateEnum(path.to_string()),
                    NameKind::Namespace => BindingError::NamespaceConflict {
                        name: path.to_string(),
                        existing: kind.as_str().to_string(),
                    },
                });
            }
            Some(existing) => {
                return Err(BindingError::NamespaceConflict {
                    name: path.to_string(),
                    existing: existing.as_str().to_string(),
                });
            }
        }

        for prefix in prefixes {
            self.names.insert(prefix, NameKind::Namespace);
        }
        self.names.insert(path.to_string(), kind);
        Ok(())
    }

    /// Publish everything into `lua`'s globals.
    ///
    /// Namespace and type tables are guarded once fully populated; enum
    /// tables become read-only views.
    pub fn install(&self, lua: &Lua) -> LuaResult<()> {
        let globals = lua.globals();
        let mut guarded: Vec<(LuaTable, String)> = Vec::new();

        // BTreeMap order puts every namespace before its children.
        for (path, kind) in &self.names {
            if *kind == NameKind::Namespace {
                let table = lua.create_table()?;
                place(&globals, path, table.clone())?;
                guarded.push((table, path.clone()));
            }
        }

        for entry in &self.types {
            let qualified = entry.qualified_name();
            let table = entry.create_table(lua)?;
            place(&globals, &qualified, table.clone())?;
            guarded.push((table, qualified));
        }

        for entry in &self.functions {
            let qualified =
                tactica_domain::scripting::binding::qualify(&entry.namespace, &entry.name);
            place(&globals, &qualified, create_native(lua, &entry.function)?)?;
        }

        for descriptor in &self.enums {
            let entries = lua.create_table()?;
            for (label, value) in &descriptor.entries {
                entries.raw_set(label.as_str(), *value)?;
            }
            let proxy = read_only_table(lua, entries, &descriptor.path)?;
            place(&globals, &descriptor.path, proxy)?;
        }

        for (table, name) in &guarded {
            guard_table(lua, table, name)?;
        }
        Ok(())
    }

    /// Install into a scratch VM so broken bindings surface at construction.
    pub fn verify(&self) -> Result<(), BindingError> {
        let lua = Lua::new();
        self.install(&lua)
            .map_err(|e| BindingError::Lua(e.to_string()))
    }

    pub fn api_surface(&self) -> ApiSurface {
        let mut types: Vec<TypeDescriptor> = self.types.iter().map(|t| t.descriptor()).collect();
        types.sort_by_key(TypeDescriptor::qualified_name);

        let mut functions: Vec<FunctionDescriptor> = self
            .functions
            .iter()
            .map(|f| FunctionDescriptor {
                namespace: f.namespace.clone(),
                name: f.name.clone(),
            })
            .collect();
        functions.sort_by_key(FunctionDescriptor::qualified_name);

        let mut enums = self.enums.clone();
        enums.sort_by(|a, b| a.path.cmp(&b.path));

        ApiSurface {
            types,
            functions,
            enums,
        }
    }
}

/// Look up the table at dotted `path`, starting from `root`.
fn lookup_table(root: &LuaTable, path: &str) -> LuaResult<LuaTable> {
    let mut table = root.clone();
    for segment in path.split('.') {
        table = table.raw_get::<LuaTable>(segment)?;
    }
    Ok(table)
}

fn place(globals: &LuaTable, path: &str, value: impl IntoLua) -> LuaResult<()> {
    match path.rsplit_once('.') {
        Some((parent, name)) => lookup_table(globals, parent)?.raw_set(name, value),
        None => globals.raw_set(path, value),
    }
}

/// Registry with the full battle/engine API, enums and module functions.
pub fn standard_registry() -> Result<BindingRegistry, BindingError> {
    let mut registry = BindingRegistry::new();
    enums_api::register(&mut registry)?;
    battle_api::register(&mut registry)?;
    engine_api::register(&mut registry)?;
    super::loader::register_module_api(&mut registry)?;
    Ok(registry)
}
