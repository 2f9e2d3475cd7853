//! MergeService: orchestrates sources and deserializes to ServiceConfig.

use super::sources;
use super::ServiceConfig;
use config::{Config, ConfigError};
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: struct defaults (lowest) -> config file -> environment (highest).
    pub fn load(config_file: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = config_file {
            builder = sources::add_file(builder, path)?;
        }
        let builder = sources::add_environment(builder)?;
        builder.build()?.try_deserialize()
    }
}
