//! ConfigLoader facade delegating to merge service.

use super::merge::MergeService;
use super::ServiceConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults overlaid with the environment.
    pub fn load() -> Result<ServiceConfig, ApiError> {
        MergeService::load(None).map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<ServiceConfig, ApiError> {
        MergeService::load(Some(path)).map_err(|e| ApiError::ConfigError(e.to_string()))
    }
}
