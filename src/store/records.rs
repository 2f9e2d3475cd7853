//! Record shapes held by the two revisioned stores.

use crate::types::{Revision, StoreKind};
use serde::{Deserialize, Serialize};

/// A record that can live in a [`RevisionedStore`](super::RevisionedStore).
///
/// `Default` is the zero-value record returned for keys never written.
pub trait Record: Clone + Default + Send + Sync + 'static {
    /// Partial update applied by one write.
    type Patch: Send;

    const KIND: StoreKind;

    /// Replace the fields present in `patch`; absent fields keep their value.
    fn apply(&mut self, patch: Self::Patch);

    fn revision(&self) -> Revision;

    fn set_revision(&mut self, revision: Revision);
}

/// Prompt text pushed by the browser for a prompt editor node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    pub positive: String,
    pub negative: String,
    pub revision: Revision,
}

/// Fields a single prompt write may carry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptPatch {
    pub positive: Option<String>,
    pub negative: Option<String>,
}

impl PromptPatch {
    pub fn both(positive: impl Into<String>, negative: impl Into<String>) -> Self {
        Self {
            positive: Some(positive.into()),
            negative: Some(negative.into()),
        }
    }
}

impl Record for PromptRecord {
    type Patch = PromptPatch;

    const KIND: StoreKind = StoreKind::Prompt;

    fn apply(&mut self, patch: PromptPatch) {
        if let Some(positive) = patch.positive {
            self.positive = positive;
        }
        if let Some(negative) = patch.negative {
            self.negative = negative;
        }
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }
}

/// Source image URL pushed by the browser for an image preview node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRecord {
    pub url: String,
    pub revision: Revision,
}

/// Fields a single preview write may carry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewPatch {
    pub url: Option<String>,
}

impl PreviewPatch {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }
}

impl Record for PreviewRecord {
    type Patch = PreviewPatch;

    const KIND: StoreKind = StoreKind::Preview;

    fn apply(&mut self, patch: PreviewPatch) {
        if let Some(url) = patch.url {
            self.url = url;
        }
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }
}
