//! Infrastructure layer for tactica
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: configuration file loading, diagnostic
//! logging and, behind the `scripting` feature, the Lua mod runtime.

pub mod config;
pub mod logging;
#[cfg(feature = "scripting")]
pub mod scripting;

// Re-export commonly used types
pub use config::{
    ConfigIssue, ConfigLoader, FileConfig, FileLoggingConfig, FileScriptingConfig, Severity,
};
pub use logging::{JsonlDiagnosticLogger, TracingDiagnosticSink};
#[cfg(feature = "scripting")]
pub use scripting::{BindingError, LuaScriptRuntime, ScriptModule};
