//! Configuration for the patchbay processing graph.
//!
//! Loads engine settings (sample rate, block size, precision, boundary
//! channel counts, reclaim period) from TOML, validates them, and converts them
//! into the core crate's [`PrepareSettings`](patchbay_core::PrepareSettings)
//! and [`GraphLayout`](patchbay_core::GraphLayout).
//!
//! # Example
//!
//! ```rust,no_run
//! use patchbay_config::EngineConfig;
//! use patchbay_core::ProcessingGraph;
//!
//! let config = EngineConfig::load("patchbay.toml").unwrap();
//! let (mut graph, _renderer) = ProcessingGraph::new(config.layout());
//! graph.prepare(config.prepare_settings());
//! ```

mod engine;
mod error;

/// Range checks for configuration values.
pub mod validation;

pub use engine::EngineConfig;
pub use error::ConfigError;
pub use validation::{ValidationError, ValidationResult, validate_engine};
