//! Fully-qualified-name registries for characters and shared libraries.
//!
//! Entries are added the first time a name is defined and are never removed.
//! A lookup miss is `None`; there is no "hit with an empty path".

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// The two classes of named modules the loader resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleClass {
    /// Resolved by fully-qualified name, loaded on first reference.
    Character,
    /// Pulled into a module through `include(name)`.
    Library,
}

impl ModuleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Library => "library",
        }
    }
}

impl fmt::Display for ModuleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from fully-qualified name to module path.
#[derive(Debug, Clone)]
pub struct FqnRegistry {
    class: ModuleClass,
    entries: BTreeMap<String, PathBuf>,
}

impl FqnRegistry {
    pub fn new(class: ModuleClass) -> Self {
        Self {
            class,
            entries: BTreeMap::new(),
        }
    }

    pub fn class(&self) -> ModuleClass {
        self.class
    }

    /// Record `fqn -> path` unless the name is already known.
    ///
    /// Returns `true` when a new entry was created. The first definition wins.
    pub fn define(&mut self, fqn: &str, path: impl Into<PathBuf>) -> bool {
        if self.entries.contains_key(fqn) {
            return false;
        }
        self.entries.insert(fqn.to_string(), path.into());
        true
    }

    pub fn get(&self, fqn: &str) -> Option<&Path> {
        self.entries.get(fqn).map(PathBuf::as_path)
    }

    pub fn contains(&self, fqn: &str) -> bool {
        self.entries.contains_key(fqn)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }
}
