//! Script runtime configuration from TOML (`[scripting]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tactica_application::RuntimeSettings;

/// Raw scripting configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileScriptingConfig {
    /// Root of the content tree
    pub mods_root: PathBuf,
    /// Shared-library search root, relative to `mods_root`
    pub shared_lib_dir: PathBuf,
    /// Enemy character packages, relative to `mods_root`
    pub character_dir: PathBuf,
    /// Player packages, relative to `mods_root`
    pub player_dir: PathBuf,
    /// Mob packages, relative to `mods_root`
    pub mob_dir: PathBuf,
    /// Card packages, relative to `mods_root`
    pub card_dir: PathBuf,
    /// Block packages, relative to `mods_root`
    pub block_dir: PathBuf,
    /// Entry file name inside every package directory
    pub entry_file: String,
    /// Seed returned by `Engine.get_rand_seed()`
    pub rand_seed: u32,
    /// Expose the Lua `string` library to scripts
    pub allow_string_lib: bool,
    /// Character FQNs provided by the engine itself
    pub builtin_characters: Vec<String>,
}

impl Default for FileScriptingConfig {
    fn default() -> Self {
        let defaults = RuntimeSettings::default();
        Self {
            mods_root: defaults.mods_root,
            shared_lib_dir: defaults.shared_lib_dir,
            character_dir: defaults.character_dir,
            player_dir: defaults.player_dir,
            mob_dir: defaults.mob_dir,
            card_dir: defaults.card_dir,
            block_dir: defaults.block_dir,
            entry_file: defaults.entry_file,
            rand_seed: defaults.rand_seed,
            allow_string_lib: defaults.allow_string_lib,
            builtin_characters: defaults.builtin_characters,
        }
    }
}

impl FileScriptingConfig {
    pub fn to_runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            mods_root: self.mods_root.clone(),
            shared_lib_dir: self.shared_lib_dir.clone(),
            character_dir: self.character_dir.clone(),
            player_dir: self.player_dir.clone(),
            mob_dir: self.mob_dir.clone(),
            card_dir: self.card_dir.clone(),
            block_dir: self.block_dir.clone(),
            entry_file: self.entry_file.clone(),
            rand_seed: self.rand_seed,
            allow_string_lib: self.allow_string_lib,
            builtin_characters: self.builtin_characters.clone(),
        }
    }
}
