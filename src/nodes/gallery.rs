use super::NodeImage;
use crate::gallery::LookupKind;
use crate::gateway::ImageGateway;
use crate::metadata::{extract_prompts, id_string, primary_model_name, unwrap_meta};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Result of one gallery node evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryOutput {
    pub positive: String,
    pub negative: String,
    pub image: NodeImage,
    pub info: String,
}

/// Turns the browser's selected gallery item into prompts, an image and an
/// info line.
#[derive(Clone)]
pub struct GalleryNode {
    gateway: Arc<ImageGateway>,
    site_base: String,
    image_timeout: Duration,
}

impl GalleryNode {
    pub fn new(gateway: Arc<ImageGateway>, site_base: &str, image_timeout: Duration) -> Self {
        Self {
            gateway,
            site_base: site_base.trim().trim_end_matches('/').to_string(),
            image_timeout,
        }
    }

    /// Page link for an item: image page first, then post page, else empty.
    pub fn page_url(&self, image_id: Option<&str>, post_id: Option<&str>) -> String {
        let link = |kind: LookupKind, id: &str| {
            format!("{}/{}/{}", self.site_base, kind.page_segment(), id)
        };
        match (image_id, post_id) {
            (Some(id), _) => link(LookupKind::Image, id),
            (None, Some(id)) => link(LookupKind::Post, id),
            (None, None) => String::new(),
        }
    }

    /// Evaluate `selection_data`, the JSON `{"item": {...}}` the browser
    /// wrote into the node's widget. Unparsable input counts as `{}`.
    pub async fn run(&self, selection_data: &str) -> GalleryOutput {
        let data: Value = serde_json::from_str(selection_data).unwrap_or(Value::Null);
        let item = match data.get("item") {
            Some(item @ Value::Object(_)) => item.clone(),
            _ => Value::Null,
        };

        let mut image_id = item
            .get("id")
            .and_then(id_string)
            .or_else(|| item.get("imageId").and_then(id_string));
        let post_id = item.get("postId").and_then(id_string);

        let raw_meta = match item.get("meta") {
            Some(Value::Null) | None => item.get("metadata").unwrap_or(&Value::Null),
            Some(meta) => meta,
        };
        let (meta, wrapper_id) = unwrap_meta(raw_meta);
        if image_id.is_none() {
            image_id = wrapper_id;
        }

        let prompts = extract_prompts(meta);
        let model_name = primary_model_name(meta);

        let image = match item.get("url").and_then(Value::as_str).map(str::trim) {
            Some(url) if !url.is_empty() => self.download(url).await,
            _ => NodeImage::Placeholder,
        };

        let mut info = format!(
            "CivitAI Page: {}",
            self.page_url(image_id.as_deref(), post_id.as_deref())
        );
        if !model_name.is_empty() {
            info.push_str(&format!("\nModel: {}", model_name));
        }
        if prompts.is_empty() {
            info = format!("No prompts found.\n{}", info);
        }

        GalleryOutput {
            positive: prompts.positive,
            negative: prompts.negative,
            image,
            info,
        }
    }

    async fn download(&self, url: &str) -> NodeImage {
        match self.gateway.fetch_anonymous(url, self.image_timeout).await {
            Ok(fetched) => fetched.into(),
            Err(e) => {
                warn!(error = %e, "Gallery image download failed, using placeholder");
                NodeImage::Placeholder
            }
        }
    }
}
