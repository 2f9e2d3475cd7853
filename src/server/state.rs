//! Shared handles every route and node entry point receives.

use crate::config::ServiceConfig;
use crate::credentials::{ApiKeyFile, CredentialSource};
use crate::error::ApiError;
use crate::gallery::{GalleryClient, ListDefaults};
use crate::gateway::{HostAllowList, ImageGateway};
use crate::nodes::{GalleryNode, ImagePreviewNode, PromptEditorNode};
use crate::store::GalleryStores;
use crate::transport::{HttpTransport, ReqwestTransport};
use std::sync::Arc;
use std::time::Duration;

/// Process-lifetime state, built once at startup and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub stores: GalleryStores,
    pub credentials: Arc<dyn CredentialSource>,
    pub gateway: Arc<ImageGateway>,
    pub gallery: Arc<GalleryClient>,
    pub list_defaults: Arc<ListDefaults>,
    pub route_prefix: String,
    pub image_timeout: Duration,
    site_base: String,
    selection_image_timeout: Duration,
}

impl AppState {
    /// Production wiring: reqwest transport and the credential file from config.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ApiError> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new());
        let credentials: Arc<dyn CredentialSource> = Arc::new(ApiKeyFile::with_key_name(
            config.credentials.api_key_file.clone(),
            config.credentials.key_name.clone(),
        ));
        Self::with_parts(config, transport, credentials)
    }

    /// Wire state around an explicit transport and credential source.
    pub fn with_parts(
        config: &ServiceConfig,
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, ApiError> {
        let upstream = &config.upstream;
        let gateway = ImageGateway::new(
            transport.clone(),
            HostAllowList::new(upstream.allowed_domain.as_str()),
        )
        .with_user_agent(upstream.user_agent.as_str())
        .with_referer(upstream.referer.as_str());

        let gallery = GalleryClient::new(transport, &upstream.api_base)
            .map_err(|e| ApiError::ConfigError(e.to_string()))?
            .with_request_timeout(upstream.request_timeout())
            .with_max_list_limit(upstream.max_list_limit)
            .with_lookup_nsfw(config.gallery.lookup_nsfw.as_str())
            .with_user_agent(upstream.user_agent.as_str());

        Ok(Self {
            stores: GalleryStores::with_soft_capacity(config.store.soft_capacity),
            credentials,
            gateway: Arc::new(gateway),
            gallery: Arc::new(gallery),
            list_defaults: Arc::new(config.gallery.list_defaults()),
            route_prefix: config.server.route_prefix.clone(),
            image_timeout: upstream.image_timeout(),
            site_base: upstream.site_base.clone(),
            selection_image_timeout: upstream.selection_image_timeout(),
        })
    }

    pub fn prompt_editor_node(&self) -> PromptEditorNode {
        PromptEditorNode::new(self.stores.prompts.clone())
    }

    pub fn image_preview_node(&self) -> ImagePreviewNode {
        ImagePreviewNode::new(
            self.stores.previews.clone(),
            self.credentials.clone(),
            self.gateway.clone(),
            self.image_timeout,
        )
    }

    pub fn gallery_node(&self) -> GalleryNode {
        GalleryNode::new(
            self.gateway.clone(),
            &self.site_base,
            self.selection_image_timeout,
        )
    }
}
