//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: domain-level errors
//! - [`handle::Handle`]: ownership-tagged references to native objects

pub mod error;
pub mod handle;
