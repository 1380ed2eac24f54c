//! CLI command implementations.

pub mod common;
pub mod plan;
pub mod render;
