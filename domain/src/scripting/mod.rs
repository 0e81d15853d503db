//! Scripting domain types
//!
//! Callback identities, native events, diagnostics and API metadata.
//! These types are engine-agnostic; the Lua runtime lives in the
//! infrastructure layer behind `ScriptRuntimePort`.

pub mod binding;
pub mod diagnostic;
pub mod event;

pub use binding::{ApiSurface, EnumDescriptor, FunctionDescriptor, PropertyDescriptor, TypeDescriptor};
pub use diagnostic::{DiagnosticKind, MemberAccess, ScriptDiagnostic, SourceLocation};
pub use event::{CallbackId, EventArg, EventKind, FireMode, NativeEvent};
