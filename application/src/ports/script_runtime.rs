//! Script runtime port: interface for the embedded scripting engine.
//!
//! This port abstracts the scripting engine so that:
//! - Use cases and the CLI don't depend on mlua
//! - A no-op implementation (`NoScriptRuntime`) is always available
//! - The `scripting` feature gate only affects infrastructure + CLI

use tactica_domain::{
    ApiSurface, DependencyGraph, DomainError, Entity, Field, Mob, PackageKind, PackageSummary,
    ScriptDiagnostic, Shared,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Recoverable runtime errors.
///
/// These are fatal to the operation that triggered them (a mob spawn, a package
/// load) but never to the host process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("No entry file found at {}", path.display())]
    ModuleNotFound { path: PathBuf },

    #[error("Failed to load {}: {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },

    #[error("Failed to load character '{fqn}': {reason}")]
    CharacterLoadFailed { fqn: String, reason: String },

    #[error("Failed to load library '{fqn}': {reason}")]
    LibraryLoadFailed { fqn: String, reason: String },

    #[error("Character '{fqn}' was never defined")]
    MissingCharacter { fqn: String },

    #[error("{} was requested again while it was still loading", path.display())]
    CircularLoad { path: PathBuf },

    #[error("Dependency cycle detected: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("Script error in {context}: {message}")]
    Script { context: String, message: String },

    #[error(transparent)]
    Domain(DomainError),

    #[error("Script runtime has been shut down")]
    ShutDown,

    #[error("Scripting support is not available in this build")]
    Unavailable,
}

impl From<DomainError> for RuntimeError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::DependencyCycle { cycle } => Self::DependencyCycle { cycle },
            other => Self::Domain(other),
        }
    }
}

impl RuntimeError {
    /// Short reason suitable for nesting inside another error message.
    pub fn reason(&self) -> String {
        match self {
            Self::LoadFailed { reason, .. }
            | Self::CharacterLoadFailed { reason, .. }
            | Self::LibraryLoadFailed { reason, .. } => reason.clone(),
            Self::Script { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Outcome of one callback dispatch pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Callbacks that ran to completion.
    pub fired: usize,
    /// Events whose slot or owner no longer exists.
    pub skipped: usize,
    /// Callbacks that raised; the pass continued past each of them.
    pub failures: Vec<ScriptDiagnostic>,
}

impl DispatchReport {
    pub fn merge(&mut self, other: DispatchReport) {
        self.fired += other.fired;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Port for the script runtime.
///
/// All calls are blocking and happen on the simulation thread. The
/// infrastructure layer provides the real `LuaScriptRuntime`; when the
/// `scripting` feature is disabled, `NoScriptRuntime` is used instead.
pub trait ScriptRuntimePort: Send + Sync {
    /// Whether the runtime is actually available (i.e. not `NoScriptRuntime`).
    fn is_available(&self) -> bool;

    /// Load the package in `dir` (once per canonical path) and report its metadata.
    fn load_package(&self, dir: &Path, kind: PackageKind) -> Result<PackageSummary, RuntimeError>;

    /// Register a character FQN. Returns `false` when the name was already known.
    fn define_character(&self, fqn: &str, dir: &Path) -> Result<bool, RuntimeError>;

    /// Register a shared library FQN. Returns `false` when the name was already known.
    fn define_library(&self, fqn: &str, dir: &Path) -> Result<bool, RuntimeError>;

    /// Load the character behind `fqn` now, failing with its name and reason.
    fn requires_character(&self, fqn: &str) -> Result<(), RuntimeError>;

    /// Run the mob package's `package_build(mob)` hook.
    fn build_mob(&self, dir: &Path, mob: &Shared<Mob>) -> Result<(), RuntimeError>;

    /// Run the character package's `character_init(entity)` hook.
    fn init_character(&self, fqn: &str, entity: &Shared<Entity>) -> Result<(), RuntimeError>;

    /// Forget the script callbacks held by entities taken off a field.
    fn release_entities(&self, entities: &[Shared<Entity>]);

    /// Step the field and fire every script callback it produced, in order.
    fn update(&self, field: &Shared<Field>, frames: u32) -> Result<DispatchReport, RuntimeError>;

    /// Snapshot of the committed package dependency graph.
    fn dependencies(&self) -> DependencyGraph;

    /// Types, functions and enums exposed to scripts.
    fn api_surface(&self) -> ApiSurface;

    /// Tear down every script environment. Later calls fail with `ShutDown`.
    fn shutdown(&self) -> Result<(), RuntimeError>;
}

/// No-op runtime used when the `scripting` feature is disabled.
///
/// Every script-backed operation fails with [`RuntimeError::Unavailable`].
pub struct NoScriptRuntime;

impl ScriptRuntimePort for NoScriptRuntime {
    fn is_available(&self) -> bool {
        false
    }

    fn load_package(&self, _dir: &Path, _kind: PackageKind) -> Result<PackageSummary, RuntimeError> {
        Err(RuntimeError::Unavailable)
    }

    fn define_character(&self, _fqn: &str, _dir: &Path) -> Result<bool, RuntimeError> {
        Err(RuntimeError::Unavailable)
    }

    fn define_library(&self, _fqn: &str, _dir: &Path) -> Result<bool, RuntimeError> {
        Err(RuntimeError::Unavailable)
    }

    fn requires_character(&self, _fqn: &str) -> Result<(), RuntimeError> {
        Err(RuntimeError::Unavailable)
    }

    fn build_mob(&self, _dir: &Path, _mob: &Shared<Mob>) -> Result<(), RuntimeError> {
        Err(RuntimeError::Unavailable)
    }

    fn init_character(&self, _fqn: &str, _entity: &Shared<Entity>) -> Result<(), RuntimeError> {
        Err(RuntimeError::Unavailable)
    }

    fn release_entities(&self, _entities: &[Shared<Entity>]) {}

    fn update(&self, _field: &Shared<Field>, _frames: u32) -> Result<DispatchReport, RuntimeError> {
        Ok(DispatchReport::default())
    }

    fn dependencies(&self) -> DependencyGraph {
        DependencyGraph::new()
    }

    fn api_surface(&self) -> ApiSurface {
        ApiSurface::default()
    }

    fn shutdown(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}
