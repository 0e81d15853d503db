//! Configuration file loading for tactica
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. Project root: `./tactica.toml` or `./.tactica.toml`
//! 3. XDG config: `$XDG_CONFIG_HOME/tactica/config.toml`
//! 4. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigIssue, FileConfig, FileLoggingConfig, FileScriptingConfig, Severity,
};
pub use loader::ConfigLoader;
