//! Script package domain types
//!
//! Packages are units of script content (characters, libraries, mobs) loaded from
//! a directory and identified by a developer-declared, dot-namespaced ID.
//! These types are engine-agnostic; the Lua runtime lives in the infrastructure
//! layer behind `ScriptRuntimePort`.

pub mod dependency;
pub mod meta;
pub mod module_state;
pub mod package_id;
pub mod registry;

pub use dependency::DependencyGraph;
pub use meta::{BLOCK_GRID, BlockProfile, PackageIdentity, PackageKind, PackageMeta, PackageSummary};
pub use module_state::ModuleState;
pub use package_id::PackageId;
pub use registry::{FqnRegistry, ModuleClass};
