//! Application layer for tactica
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::RuntimeSettings;
pub use ports::{
    diagnostics::{CollectingDiagnostics, CompositeDiagnosticSink, DiagnosticSink, NoDiagnostics},
    host_services::{HostServicesPort, InputQuery, NullHostServices},
    script_runtime::{DispatchReport, NoScriptRuntime, RuntimeError, ScriptRuntimePort},
};
pub use use_cases::load_packages::{
    LoadPackagesOutput, LoadPackagesUseCase, PackageFailure,
};
pub use use_cases::spawn_mob::{
    SpawnMobError, SpawnMobInput, SpawnMobOutput, SpawnMobUseCase, SpawnedCharacter,
};
