//! Host Node Entry Points
//!
//! What the node-graph host calls: each node type exposes a change signal and
//! a compute step reading from the shared stores. Compute steps never fail on
//! a remote image problem; they degrade to [`NodeImage::Placeholder`].

mod gallery;
mod preview;
mod prompt_editor;

pub use gallery::{GalleryNode, GalleryOutput};
pub use preview::ImagePreviewNode;
pub use prompt_editor::PromptEditorNode;

use crate::gateway::FetchedImage;
use bytes::Bytes;

/// Menu category every node is listed under.
pub const NODE_CATEGORY: &str = "Asset Gallery/Civitai";

/// Image value handed back to the host graph.
///
/// Pixels stay encoded; decoding belongs to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeImage {
    Encoded { bytes: Bytes, content_type: String },
    /// 1×1 black image used when nothing could be fetched
    Placeholder,
}

impl NodeImage {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, NodeImage::Placeholder)
    }

    /// Width and height for the placeholder; `None` for encoded images.
    pub fn placeholder_size(&self) -> Option<(u32, u32)> {
        match self {
            NodeImage::Placeholder => Some((1, 1)),
            NodeImage::Encoded { .. } => None,
        }
    }
}

impl From<FetchedImage> for NodeImage {
    fn from(image: FetchedImage) -> Self {
        NodeImage::Encoded {
            bytes: image.bytes,
            content_type: image.content_type,
        }
    }
}

/// Catalog entry the host registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub type_name: &'static str,
    pub display_name: &'static str,
    pub category: &'static str,
    /// Named outputs in order
    pub outputs: &'static [&'static str],
    /// Display-only node with no compute result
    pub output_node: bool,
}

pub const GALLERY_NODE: NodeDescriptor = NodeDescriptor {
    type_name: "CivitaiGalleryNode",
    display_name: "CivitAI Gallery (Rebuilt)",
    category: NODE_CATEGORY,
    outputs: &["Positive", "Negative", "Image", "Info"],
    output_node: false,
};

pub const PROMPT_EDITOR_NODE: NodeDescriptor = NodeDescriptor {
    type_name: "CivitaiPromptEditorNode",
    display_name: "CivitAI Prompt Editor",
    category: NODE_CATEGORY,
    outputs: &["Positive", "Negative"],
    output_node: false,
};

/// Output-only text panel the browser fills in; its compute step does nothing.
pub const INFO_DISPLAY_NODE: NodeDescriptor = NodeDescriptor {
    type_name: "CivitaiInfoDisplayNode",
    display_name: "CivitAI Info Display",
    category: NODE_CATEGORY,
    outputs: &[],
    output_node: true,
};

pub const IMAGE_PREVIEW_NODE: NodeDescriptor = NodeDescriptor {
    type_name: "CivitaiImagePreviewNode",
    display_name: "CivitAI Image Preview (Protected)",
    category: NODE_CATEGORY,
    outputs: &["Image"],
    output_node: false,
};

/// All node types, in registration order.
pub fn catalog() -> [NodeDescriptor; 4] {
    [
        GALLERY_NODE,
        PROMPT_EDITOR_NODE,
        INFO_DISPLAY_NODE,
        IMAGE_PREVIEW_NODE,
    ]
}

/// Look up a node type by its registered type name.
pub fn descriptor(type_name: &str) -> Option<NodeDescriptor> {
    catalog().into_iter().find(|d| d.type_name == type_name)
}
