//! Layered configuration loader.
//!
//! Discovers configuration layers (user, cwd, runtime), validates their
//! schema, merges them, applies environment overrides and produces a final
//! `TherapyConfig`.

mod env;
mod layer_io;
mod merge;
mod schema;
mod utils;


pub use env::parse_duration;

use crate::{ConfigError, TherapyConfig};
use log::{debug, info};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "ai-therapy.json5";
/// Default config directory under the user's home.
const DEFAULT_CONFIG_DIR: &str = ".ai-therapy";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: TherapyConfig,
    /// Metadata for each layer that contributed.
    pub layers: Vec<ConfigLayer>,
    /// Number of environment overrides applied.
    pub env_overrides: usize,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// User-specific configuration.
    User,
    /// Current working directory configuration.
    Cwd,
    /// Runtime overrides (highest file precedence).
    Runtime,
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    /// Layer origin.
    pub source: ConfigLayerSource,
    /// Location on disk if present.
    pub path: Option<PathBuf>,
}

/// Where environment overrides are read from.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// The process environment.
    #[default]
    Process,
    /// A fixed set of variables.
    Fixed(HashMap<String, String>),
    /// Skip environment overrides.
    Disabled,
}

impl EnvSource {
    fn lookup(&self, key: &str) -> Option<String> {
        match self {
            EnvSource::Process => std::env::var(key).ok(),
            EnvSource::Fixed(vars) => vars.get(key).cloned(),
            EnvSource::Disabled => None,
        }
    }
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to resolve the cwd layer.
    pub cwd: PathBuf,
    /// Optional user config path (defaults to `~/.ai-therapy/ai-therapy.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Runtime override config paths applied after the file layers.
    pub runtime_paths: Vec<PathBuf>,
    /// Environment override source, applied last.
    pub env: EnvSource,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            user_config_path: layer_io::default_user_config_path(),
            runtime_paths: Vec::new(),
            env: EnvSource::Process,
        }
    }

    /// Add a runtime override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Replace the environment override source.
    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }
}

impl TherapyConfig {
    /// Load a single config from a path (no layering, overrides or validation).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        let value: Value = json5::from_str(&contents)?;
        config_from_value(value, "config")
    }

    /// Load a single config from JSON5 contents (no layering, overrides or validation).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered config with defaults (cwd={})",
            cwd.as_ref().display()
        );
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations and overrides.
    ///
    /// Precedence (low -> high): defaults, user, cwd, runtime, environment.
    /// The result is validated.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = utils::normalize_path(&options.cwd)?;
        debug!("normalized cwd for config load: {}", cwd.display());
        let mut layers = Vec::new();
        let mut merge_layers = Vec::new();
        let mut seen_paths = HashSet::new();

        let candidates = [
            (ConfigLayerSource::User, options.user_config_path.clone()),
            (ConfigLayerSource::Cwd, Some(cwd.join(DEFAULT_CONFIG_FILE))),
        ];
        for (source, path) in candidates {
            let Some(path) = path else {
                continue;
            };
            if path.exists() && !seen_paths.insert(utils::unique_path(&path)) {
                debug!(
                    "skipping duplicate layer (source={:?}, path={})",
                    source,
                    path.display()
                );
                continue;
            }
            if let Some(layer) = layer_io::load_optional_layer(source, Some(&path))? {
                debug!("loaded {:?} layer", source);
                layers.push(layer.meta.clone());
                merge_layers.push(layer);
            }
        }

        for runtime_path in &options.runtime_paths {
            let loaded = layer_io::load_required_layer(ConfigLayerSource::Runtime, runtime_path)?;
            debug!("loaded runtime layer (path={})", runtime_path.display());
            layers.push(loaded.meta.clone());
            merge_layers.push(loaded);
        }

        let mut merged = Value::Object(serde_json::Map::new());
        for layer in merge_layers {
            merge::merge_json_values(&mut merged, &layer.value);
        }

        let mut config = config_from_value(merged, "effective")?;
        let env_overrides = env::apply_env_overrides(&mut config, |key| options.env.lookup(key))?;
        config.validate()?;
        info!(
            "layered config loaded (layers={}, env_overrides={})",
            layers.len(),
            env_overrides
        );
        Ok(LayeredConfig {
            config,
            layers,
            env_overrides,
        })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.claude.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "claude.api_key is required (set CLAUDE_API_KEY)".to_string(),
            ));
        }
        if self.memory.enabled && self.memory.openai_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "memory.openai_api_key is required when memory is enabled (set OPENAI_API_KEY)"
                    .to_string(),
            ));
        }
        if self.memory.batch_size == 0 {
            return Err(ConfigError::InvalidField {
                path: "memory.batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidField {
                path: "retry.backoff_factor".to_string(),
                message: "must be a finite number >= 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Internal representation of a loaded config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<TherapyConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    Ok(serde_json::from_value(value)?)
}
