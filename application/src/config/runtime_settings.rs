//! Runtime settings: where script content lives and how environments are built.
//!
//! [`RuntimeSettings`] is the application-level view of the `[scripting]`
//! config section. Search roots are resolved against `mods_root`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Root of the content tree.
    pub mods_root: PathBuf,
    /// Shared-library search root, relative to `mods_root`.
    pub shared_lib_dir: PathBuf,
    pub character_dir: PathBuf,
    pub player_dir: PathBuf,
    pub mob_dir: PathBuf,
    pub card_dir: PathBuf,
    pub block_dir: PathBuf,
    /// File executed when a package directory is loaded.
    pub entry_file: String,
    /// Value returned by `Engine.get_rand_seed()`.
    pub rand_seed: u32,
    /// Whether environments get the `string` library.
    pub allow_string_lib: bool,
    /// FQNs `requires_character` accepts without a package on disk.
    pub builtin_characters: Vec<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            mods_root: PathBuf::from("mods"),
            shared_lib_dir: PathBuf::from("libs"),
            character_dir: PathBuf::from("enemies"),
            player_dir: PathBuf::from("players"),
            mob_dir: PathBuf::from("mobs"),
            card_dir: PathBuf::from("cards"),
            block_dir: PathBuf::from("blocks"),
            entry_file: "entry.lua".to_string(),
            rand_seed: 0,
            allow_string_lib: true,
            builtin_characters: vec![
                "com.builtins.char.canodumb".to_string(),
                "com.builtins.char.mettaur".to_string(),
            ],
        }
    }
}

impl RuntimeSettings {
    // ==================== Builder Methods ====================

    pub fn with_mods_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.mods_root = root.into();
        self
    }

    pub fn with_rand_seed(mut self, seed: u32) -> Self {
        self.rand_seed = seed;
        self
    }

    pub fn with_builtin_characters(mut self, fqns: Vec<String>) -> Self {
        self.builtin_characters = fqns;
        self
    }

    // ==================== Resolved Paths ====================

    pub fn shared_lib_root(&self) -> PathBuf {
        self.mods_root.join(&self.shared_lib_dir)
    }

    pub fn character_root(&self) -> PathBuf {
        self.mods_root.join(&self.character_dir)
    }

    pub fn player_root(&self) -> PathBuf {
        self.mods_root.join(&self.player_dir)
    }

    pub fn mob_root(&self) -> PathBuf {
        self.mods_root.join(&self.mob_dir)
    }

    pub fn card_root(&self) -> PathBuf {
        self.mods_root.join(&self.card_dir)
    }

    pub fn block_root(&self) -> PathBuf {
        self.mods_root.join(&self.block_dir)
    }

    /// Entry file of the package stored in `dir`.
    pub fn entry_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.entry_file)
    }

    pub fn is_builtin_character(&self, fqn: &str) -> bool {
        self.builtin_characters.iter().any(|b| b == fqn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.shared_lib_root(), PathBuf::from("mods/libs"));
        assert_eq!(settings.character_root(), PathBuf::from("mods/enemies"));
        assert_eq!(settings.card_root(), PathBuf::from("mods/cards"));
        assert_eq!(settings.block_root(), PathBuf::from("mods/blocks"));
        assert_eq!(
            settings.entry_path(Path::new("mods/enemies/hero")),
            PathBuf::from("mods/enemies/hero/entry.lua")
        );
        assert!(settings.is_builtin_character("com.builtins.char.mettaur"));
        assert!(!settings.is_builtin_character("com.test.hero"));
    }

    #[test]
    fn test_builders() {
        let settings = RuntimeSettings::default()
            .with_mods_root("/tmp/content")
            .with_rand_seed(7)
            .with_builtin_characters(vec![]);
        assert_eq!(settings.mob_root(), PathBuf::from("/tmp/content/mobs"));
        assert_eq!(settings.rand_seed, 7);
        assert!(settings.builtin_characters.is_empty());
    }
}
