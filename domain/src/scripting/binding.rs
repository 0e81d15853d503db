//! Reflection metadata for the script-visible API surface.
//!
//! The runtime builds one [`TypeDescriptor`] per bound native type alongside the
//! actual accessor closures. Guards use it to tell unknown members from
//! read-only ones; the CLI prints it as the API listing.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    /// Dotted namespace path, e.g. `Battle` or `Engine`.
    pub namespace: String,
    pub name: String,
    pub constructors: Vec<String>,
    pub properties: Vec<PropertyDescriptor>,
    pub methods: Vec<String>,
}

impl TypeDescriptor {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            constructors: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// `Battle.Entity`, or just the name for root-level types.
    pub fn qualified_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m == name)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.property(name).is_some() || self.has_method(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDescriptor {
    pub namespace: String,
    pub name: String,
}

impl FunctionDescriptor {
    pub fn qualified_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDescriptor {
    /// Dotted path of the enum table, e.g. `Input.Pressed`.
    pub path: String,
    pub entries: Vec<(String, i64)>,
}

/// Everything a runtime exposes to scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiSurface {
    pub types: Vec<TypeDescriptor>,
    pub functions: Vec<FunctionDescriptor>,
    pub enums: Vec<EnumDescriptor>,
}

impl ApiSurface {
    pub fn find_type(&self, qualified_name: &str) -> Option<&TypeDescriptor> {
        self.types
            .iter()
            .find(|t| t.qualified_name() == qualified_name)
    }
}

/// Join a namespace path and a member name.
pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}
