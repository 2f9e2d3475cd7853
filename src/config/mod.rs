//! Service configuration
//!
//! Layered through the `config` crate: built-in defaults, then an optional
//! TOML file, then `CIVITAI_GALLERY__SECTION__KEY` environment variables.
//! CLI flags are applied on top by the binary.

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

use crate::credentials::DEFAULT_KEY_NAME;
use crate::gallery::{ListDefaults, MAX_LIST_LIMIT};
use crate::logging::LoggingConfig;
use crate::store::DEFAULT_SOFT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// User-Agent sent on every outbound request.
pub const DEFAULT_USER_AGENT: &str = "ComfyUI-CivitAI-Gallery";

/// Environment prefix for configuration overrides.
pub const ENV_PREFIX: &str = "CIVITAI_GALLERY";

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub gallery: GalleryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Path prefix all routes are nested under
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,
}

fn default_bind() -> String {
    "127.0.0.1:8188".to_string()
}

fn default_route_prefix() -> String {
    "/civitai_gallery".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            route_prefix: default_route_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// `KEY=value` file holding the API key
    #[serde(default = "default_api_key_file")]
    pub api_key_file: PathBuf,
    #[serde(default = "default_key_name")]
    pub key_name: String,
}

fn default_api_key_file() -> PathBuf {
    PathBuf::from("api_key.txt")
}

fn default_key_name() -> String {
    DEFAULT_KEY_NAME.to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            api_key_file: default_api_key_file(),
            key_name: default_key_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Website root used for page links
    #[serde(default = "default_site_base")]
    pub site_base: String,
    /// Domain whose hosts the image gateway may contact
    #[serde(default = "default_allowed_domain")]
    pub allowed_domain: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,
    #[serde(default = "default_selection_image_timeout_secs")]
    pub selection_image_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_referer")]
    pub referer: String,
    #[serde(default = "default_max_list_limit")]
    pub max_list_limit: u32,
}

fn default_api_base() -> String {
    "https://civitai.com/api/v1".to_string()
}

fn default_site_base() -> String {
    "https://civitai.com".to_string()
}

fn default_allowed_domain() -> String {
    "civitai.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_image_timeout_secs() -> u64 {
    60
}

fn default_selection_image_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_referer() -> String {
    "https://civitai.com/".to_string()
}

fn default_max_list_limit() -> u32 {
    MAX_LIST_LIMIT
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            site_base: default_site_base(),
            allowed_domain: default_allowed_domain(),
            request_timeout_secs: default_request_timeout_secs(),
            image_timeout_secs: default_image_timeout_secs(),
            selection_image_timeout_secs: default_selection_image_timeout_secs(),
            user_agent: default_user_agent(),
            referer: default_referer(),
            max_list_limit: default_max_list_limit(),
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn selection_image_timeout(&self) -> Duration {
        Duration::from_secs(self.selection_image_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_sort")]
    pub default_sort: String,
    #[serde(default = "default_period")]
    pub default_period: String,
    #[serde(default = "default_nsfw")]
    pub default_nsfw: String,
    /// nsfw level forced on single-item lookups
    #[serde(default = "default_lookup_nsfw")]
    pub lookup_nsfw: String,
}

fn default_limit() -> u32 {
    ListDefaults::default().limit
}

fn default_sort() -> String {
    ListDefaults::default().sort
}

fn default_period() -> String {
    ListDefaults::default().period
}

fn default_nsfw() -> String {
    ListDefaults::default().nsfw
}

fn default_lookup_nsfw() -> String {
    "X".to_string()
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_sort: default_sort(),
            default_period: default_period(),
            default_nsfw: default_nsfw(),
            lookup_nsfw: default_lookup_nsfw(),
        }
    }
}

impl GalleryConfig {
    pub fn list_defaults(&self) -> ListDefaults {
        ListDefaults {
            limit: self.default_limit,
            sort: self.default_sort.clone(),
            period: self.default_period.clone(),
            nsfw: self.default_nsfw.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Key count past which each store logs a warning; nothing is evicted
    #[serde(default = "default_soft_capacity")]
    pub soft_capacity: usize,
}

fn default_soft_capacity() -> usize {
    DEFAULT_SOFT_CAPACITY
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            soft_capacity: default_soft_capacity(),
        }
    }
}
