//! Configuration models and layered config loading.
//!
//! This crate owns the ai-therapy config schema, validation, environment
//! overrides and layer-merging logic used by the binary.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{
    ConfigLayer, ConfigLayerSource, EnvSource, LayeredConfig, LayeredConfigOptions,
    parse_duration,
};
/// Configuration schema models.
pub use model::*;
