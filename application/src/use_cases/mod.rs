//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod load_packages;
pub mod spawn_mob;
