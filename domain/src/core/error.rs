//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{type_name} no longer exists")]
    ExpiredHandle { type_name: &'static str },

    #[error("{type_name} is already borrowed by the current call")]
    HandleBusy { type_name: &'static str },

    #[error("Invalid package id '{0}': expected dot-separated segments like com.vendor.char.name")]
    InvalidPackageId(String),

    #[error("Dependency cycle detected: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("Unknown {enum_name} value: {value}")]
    UnknownEnumValue { enum_name: &'static str, value: i64 },

    #[error("Tile ({x}, {y}) is outside the field")]
    OutOfBounds { x: i64, y: i64 },

    #[error("Entity #{id} is already on a field")]
    AlreadySpawned { id: u64 },

    #[error("Cannot attach sprite node: {0}")]
    SpriteTree(&'static str),

    #[error("{method} is only available to {expected} packages, not {actual}")]
    WrongPackageKind {
        method: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid card code '{0}': expected a letter A-Z or *")]
    InvalidCardCode(String),

    #[error("Block shape needs {expected} cells, got {actual}")]
    InvalidBlockShape { expected: usize, actual: usize },
}

impl DomainError {
    /// Check if this error comes from touching an object that was already destroyed
    pub fn is_expired(&self) -> bool {
        matches!(self, DomainError::ExpiredHandle { .. })
    }
}
