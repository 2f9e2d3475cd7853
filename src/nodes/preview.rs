use super::NodeImage;
use crate::credentials::CredentialSource;
use crate::gateway::ImageGateway;
use crate::store::PreviewStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Turns the preview URL the browser pushed into an image for the graph.
///
/// The fetch goes through the same gateway as the proxy route, so the
/// allow-list and credential handling are identical.
#[derive(Clone)]
pub struct ImagePreviewNode {
    previews: Arc<PreviewStore>,
    credentials: Arc<dyn CredentialSource>,
    gateway: Arc<ImageGateway>,
    timeout: Duration,
}

impl ImagePreviewNode {
    pub fn new(
        previews: Arc<PreviewStore>,
        credentials: Arc<dyn CredentialSource>,
        gateway: Arc<ImageGateway>,
        timeout: Duration,
    ) -> Self {
        Self {
            previews,
            credentials,
            gateway,
            timeout,
        }
    }

    pub fn is_changed(&self, node_id: &str) -> String {
        self.previews.signal(node_id)
    }

    /// A supplied `image` passes through; otherwise fetch the stored URL.
    ///
    /// Never fails: a missing URL, missing credential, or fetch error all
    /// produce [`NodeImage::Placeholder`].
    pub async fn run(&self, image: Option<NodeImage>, node_id: &str) -> NodeImage {
        if let Some(image) = image {
            return image;
        }

        let url = self.previews.read(node_id).url;
        if url.is_empty() {
            debug!(node_id = %node_id, "No preview URL stored");
            return NodeImage::Placeholder;
        }

        let Some(key) = self.credentials.load() else {
            warn!(node_id = %node_id, "Preview fetch skipped: no API key configured");
            return NodeImage::Placeholder;
        };

        match self.gateway.fetch(&url, &key, self.timeout).await {
            Ok(fetched) => fetched.into(),
            Err(e) => {
                warn!(node_id = %node_id, error = %e, "Preview fetch failed, using placeholder");
                NodeImage::Placeholder
            }
        }
    }
}
