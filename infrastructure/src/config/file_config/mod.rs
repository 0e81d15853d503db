//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application settings.

mod logging;
mod scripting;

pub use logging::FileLoggingConfig;
pub use scripting::FileScriptingConfig;

use serde::{Deserialize, Serialize};
use std::fmt;
use tactica_application::RuntimeSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A problem found while validating the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    /// Dotted config key, e.g. `scripting.entry_file`.
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Script runtime settings
    pub scripting: FileScriptingConfig,
    /// Log destinations
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Issues are warnings; the runtime still starts with the given values.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let scripting = &self.scripting;

        // 1. Entry file name
        if scripting.entry_file.trim().is_empty() {
            issues.push(ConfigIssue::warning(
                "scripting.entry_file",
                "entry file name is empty; no package will be found",
            ));
        }

        // 2. Search roots must stay under mods_root
        let roots = [
            ("scripting.shared_lib_dir", &scripting.shared_lib_dir),
            ("scripting.character_dir", &scripting.character_dir),
            ("scripting.player_dir", &scripting.player_dir),
            ("scripting.mob_dir", &scripting.mob_dir),
            ("scripting.card_dir", &scripting.card_dir),
            ("scripting.block_dir", &scripting.block_dir),
        ];
        for (field, dir) in roots {
            if dir.is_absolute() {
                issues.push(ConfigIssue::warning(
                    field,
                    format!(
                        "'{}' is absolute; it is expected to be relative to mods_root",
                        dir.display()
                    ),
                ));
            }
        }

        // 3. Builtin character names
        for fqn in &scripting.builtin_characters {
            if tactica_domain::PackageId::new(fqn.as_str()).is_err() {
                issues.push(ConfigIssue::warning(
                    "scripting.builtin_characters",
                    format!("'{}' is not a valid package id", fqn),
                ));
            }
        }

        issues
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        self.scripting.to_runtime_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[scripting]
mods_root = "content"
shared_lib_dir = "shared"
entry_file = "main.lua"
rand_seed = 42
allow_string_lib = false
builtin_characters = ["com.builtins.char.mettaur"]

[logging]
file = "tactica.log"
diagnostics_jsonl = "diagnostics.jsonl"
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let settings = config.runtime_settings();
        assert_eq!(settings.shared_lib_root(), PathBuf::from("content/shared"));
        assert_eq!(settings.entry_file, "main.lua");
        assert_eq!(settings.rand_seed, 42);
        assert!(!settings.allow_string_lib);
        assert_eq!(settings.builtin_characters.len(), 1);
        assert_eq!(config.logging.file, Some(PathBuf::from("tactica.log")));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let toml_str = r#"
[scripting]
rand_seed = 7
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scripting.rand_seed, 7);
        // Defaults should apply
        assert_eq!(config.scripting.entry_file, "entry.lua");
        assert_eq!(config.scripting.builtin_characters.len(), 2);
        assert!(config.logging.diagnostics_jsonl.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        let config = FileConfig::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_reports_warnings() {
        let mut config = FileConfig::default();
        config.scripting.entry_file = " ".to_string();
        config.scripting.shared_lib_dir = PathBuf::from("/abs/libs");
        config.scripting.builtin_characters.push("bad id".to_string());

        let issues = config.validate();
        let fields: Vec<_> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "scripting.entry_file",
                "scripting.shared_lib_dir",
                "scripting.builtin_characters"
            ]
        );
        assert!(issues.iter().all(|i| i.severity == Severity::Warning));
    }
}
