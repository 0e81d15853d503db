//! Domain layer for tactica
//!
//! This crate contains the engine-agnostic core of the scripting runtime.
//! It has no dependency on the Lua interpreter or on the filesystem layout.
//!
//! # Core Concepts
//!
//! ## Handles
//!
//! Native objects cross into scripts only as [`Handle`]s, which are either
//! owning (keep the object alive) or weak (observe an object owned elsewhere
//! and report [`DomainError::ExpiredHandle`] once it is gone).
//!
//! ## Packages
//!
//! Script content is organised in packages with a declared [`PackageId`].
//! Shared-library includes feed the [`DependencyGraph`]; characters and
//! libraries are resolved by name through [`FqnRegistry`].

pub mod battle;
pub mod core;
pub mod package;
pub mod scripting;

// Re-export commonly used types
pub use battle::{
    Animation, AudioPriority, BlockColor, CardClass, CardProperties, Color, Direction, Drag,
    Element, Entity, EntityId, EntityKind, Field, HitProps, Mob, Playback, PressedInput, Rank,
    ReleasedInput, SpawnRequest, Spawner, SpriteNode, StateChange, Team, TileState,
};
pub use core::{
    error::DomainError,
    handle::{Handle, NativeType, Ownership, Shared, share},
};
pub use package::{
    DependencyGraph, FqnRegistry, ModuleClass, ModuleState, PackageId, PackageIdentity,
    PackageKind, PackageMeta, PackageSummary,
};
pub use scripting::{
    ApiSurface, CallbackId, DiagnosticKind, EnumDescriptor, EventArg, EventKind, FireMode,
    FunctionDescriptor, MemberAccess, NativeEvent, PropertyDescriptor, ScriptDiagnostic,
    SourceLocation, TypeDescriptor,
};
