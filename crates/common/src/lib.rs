//! Shared building blocks for the items service crates.

pub mod types;
pub mod utils;
pub mod env;
