//! Load packages use case
//!
//! Scans the content tree and loads every package it finds:
//!
//! 1. **Libraries** from `mods_root/libs`, registered with `define_library`
//!    so later includes resolve to the shared copy
//! 2. **Characters** from `mods_root/enemies`, registered with `define_character`
//! 3. **Players** from `mods_root/players`, registered with `define_character`
//! 4. **Cards** from `mods_root/cards` and **blocks** from `mods_root/blocks`,
//!    loaded for their metadata only
//!
//! Directories are visited in alphabetical order. A package that fails to
//! load is reported and skipped; it never prevents other packages from loading.

use crate::config::RuntimeSettings;
use crate::ports::script_runtime::{RuntimeError, ScriptRuntimePort};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tactica_domain::{DependencyGraph, PackageKind, PackageSummary};
use tracing::{debug, info, warn};

/// A package that could not be loaded or registered.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageFailure {
    pub path: PathBuf,
    pub kind: PackageKind,
    pub error: RuntimeError,
}

#[derive(Debug, Clone, Default)]
pub struct LoadPackagesOutput {
    pub loaded: Vec<PackageSummary>,
    pub failures: Vec<PackageFailure>,
    pub dependencies: DependencyGraph,
}

impl LoadPackagesOutput {
    pub fn find(&self, id: &str) -> Option<&PackageSummary> {
        self.loaded
            .iter()
            .find(|p| p.id.as_ref().is_some_and(|pid| pid.as_str() == id))
    }
}

pub struct LoadPackagesUseCase {
    runtime: Arc<dyn ScriptRuntimePort>,
    settings: RuntimeSettings,
}

impl LoadPackagesUseCase {
    pub fn new(runtime: Arc<dyn ScriptRuntimePort>, settings: RuntimeSettings) -> Self {
        Self { runtime, settings }
    }

    pub fn execute(&self) -> LoadPackagesOutput {
        let mut output = LoadPackagesOutput::default();

        let roots = [
            (PackageKind::Library, self.settings.shared_lib_root()),
            (PackageKind::Character, self.settings.character_root()),
            (PackageKind::Player, self.settings.player_root()),
            (PackageKind::Card, self.settings.card_root()),
            (PackageKind::Block, self.settings.block_root()),
        ];

        for (kind, root) in roots {
            let dirs = package_dirs(&root);
            debug!(root = %root.display(), count = dirs.len(), kind = %kind, "Scanning packages");
            for dir in dirs {
                match self.load_one(&dir, kind) {
                    Ok(summary) => output.loaded.push(summary),
                    Err(error) => {
                        warn!(path = %dir.display(), kind = %kind, "Package skipped: {}", error);
                        output.failures.push(PackageFailure {
                            path: dir,
                            kind,
                            error,
                        });
                    }
                }
            }
        }

        output.dependencies = self.runtime.dependencies();
        info!(
            loaded = output.loaded.len(),
            failed = output.failures.len(),
            "Package scan complete"
        );
        output
    }

    fn load_one(&self, dir: &Path, kind: PackageKind) -> Result<PackageSummary, RuntimeError> {
        let entry = self.settings.entry_path(dir);
        if !entry.is_file() {
            return Err(RuntimeError::ModuleNotFound { path: entry });
        }

        let summary = self.runtime.load_package(dir, kind)?;
        let id = summary.id.as_ref().ok_or_else(|| RuntimeError::LoadFailed {
            path: entry.clone(),
            reason: "package never called declare_package_id".to_string(),
        })?;

        let fresh = match kind {
            PackageKind::Library => self.runtime.define_library(id.as_str(), dir)?,
            PackageKind::Character | PackageKind::Player => {
                self.runtime.define_character(id.as_str(), dir)?
            }
            PackageKind::Mob | PackageKind::Card | PackageKind::Block => true,
        };
        if !fresh {
            warn!(id = %id, path = %dir.display(), "Package id already defined; keeping the first definition");
        }
        Ok(summary)
    }
}

/// Immediate subdirectories of `root`, sorted by name. A missing root is empty.
fn package_dirs(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}
