//! Application-level configuration.
//!
//! - [`RuntimeSettings`]: content layout and environment options for the script runtime

pub mod runtime_settings;

pub use runtime_settings::RuntimeSettings;
