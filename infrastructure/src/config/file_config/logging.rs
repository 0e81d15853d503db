//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw logging configuration from TOML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Write tracing output to this file in addition to stderr
    pub file: Option<PathBuf>,
    /// Append every script diagnostic to this JSONL file
    pub diagnostics_jsonl: Option<PathBuf>,
}
