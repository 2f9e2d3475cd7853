//! Revisioned Key-Value Store
//!
//! Maps a node id to a small record plus a per-key revision counter. A polling
//! client compares the revision it saw last with [`RevisionedStore::signal`]
//! to learn that new data is available.
//!
//! Each write is a read-modify-write under the store's write lock: the fields
//! are replaced and the revision bumped before any reader can observe the
//! entry again. The lock is never held across an await point.

mod records;

pub use records::{PreviewPatch, PreviewRecord, PromptPatch, PromptRecord, Record};

use crate::types::{NodeId, Revision, StoreKind};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Capacity of the per-store event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default key count past which a store logs a capacity warning.
pub const DEFAULT_SOFT_CAPACITY: usize = 10_000;

/// Published after every committed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreEvent {
    pub store: StoreKind,
    pub node_id: NodeId,
    pub revision: Revision,
    /// RFC 3339 timestamp of the commit
    pub emitted_at: String,
}

/// In-memory, process-lifetime store with per-key revisions
pub struct RevisionedStore<R: Record> {
    entries: RwLock<HashMap<NodeId, R>>,
    events: broadcast::Sender<StoreEvent>,
    soft_capacity: usize,
    capacity_warned: AtomicBool,
}

pub type PromptStore = RevisionedStore<PromptRecord>;
pub type PreviewStore = RevisionedStore<PreviewRecord>;

impl<R: Record> RevisionedStore<R> {
    pub fn new() -> Self {
        Self::with_soft_capacity(DEFAULT_SOFT_CAPACITY)
    }

    /// Entries are never evicted; crossing `soft_capacity` only logs a warning once.
    pub fn with_soft_capacity(soft_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
            soft_capacity,
            capacity_warned: AtomicBool::new(false),
        }
    }

    /// Apply `patch` to the record for `node_id` and bump its revision.
    ///
    /// Every call bumps, even when the content is unchanged: a write asserts
    /// that something changed. Returns the new revision.
    pub fn write(&self, node_id: &str, patch: R::Patch) -> Revision {
        let (revision, len) = {
            let mut entries = self.entries.write();
            let entry = entries.entry(node_id.to_string()).or_default();
            entry.apply(patch);
            let revision = entry.revision() + 1;
            entry.set_revision(revision);
            // Sent under the guard so subscribers see a key's revisions in order.
            // No subscribers is the normal case for polling-only hosts.
            let _ = self.events.send(StoreEvent {
                store: R::KIND,
                node_id: node_id.to_string(),
                revision,
                emitted_at: chrono::Utc::now().to_rfc3339(),
            });
            (revision, entries.len())
        };

        debug!(store = %R::KIND, node_id, revision, "Store record written");
        if len > self.soft_capacity && !self.capacity_warned.swap(true, Ordering::Relaxed) {
            warn!(
                store = %R::KIND,
                entries = len,
                soft_capacity = self.soft_capacity,
                "Store grew past its soft capacity; entries are kept until process exit"
            );
        }
        revision
    }

    /// Current record, or the zero-value record when `node_id` was never written.
    pub fn read(&self, node_id: &str) -> R {
        self.entries
            .read()
            .get(node_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Current revision; 0 for absent keys.
    pub fn revision(&self, node_id: &str) -> Revision {
        self.entries
            .read()
            .get(node_id)
            .map(Record::revision)
            .unwrap_or(0)
    }

    /// Change-detection token: the decimal revision.
    pub fn signal(&self, node_id: &str) -> String {
        self.revision(node_id).to_string()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn kind(&self) -> StoreKind {
        R::KIND
    }

    /// Subscribe to commits made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

impl<R: Record> Default for RevisionedStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// The two stores, constructed once at process start and shared by handle
#[derive(Clone)]
pub struct GalleryStores {
    pub prompts: Arc<PromptStore>,
    pub previews: Arc<PreviewStore>,
}

impl GalleryStores {
    pub fn new() -> Self {
        Self::with_soft_capacity(DEFAULT_SOFT_CAPACITY)
    }

    pub fn with_soft_capacity(soft_capacity: usize) -> Self {
        Self {
            prompts: Arc::new(PromptStore::with_soft_capacity(soft_capacity)),
            previews: Arc::new(PreviewStore::with_soft_capacity(soft_capacity)),
        }
    }

    /// Signal for `node_id` in the store named by `kind`.
    pub fn signal(&self, kind: StoreKind, node_id: &str) -> String {
        match kind {
            StoreKind::Prompt => self.prompts.signal(node_id),
            StoreKind::Preview => self.previews.signal(node_id),
        }
    }
}

impl Default for GalleryStores {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn absent_keys_read_as_zero_records() {
        let store = PromptStore::new();
        assert_eq!(store.read("missing"), PromptRecord::default());
        assert_eq!(store.signal("missing"), "0");
        assert_eq!(store.signal("missing"), store.signal("also-missing"));
    }

    #[test]
    fn write_then_read_returns_written_fields() {
        let store = PromptStore::new();
        let revision = store.write("7", PromptPatch::both("a cat", "blurry"));
        assert_eq!(revision, 1);
        let record = store.read("7");
        assert_eq!(record.positive, "a cat");
        assert_eq!(record.negative, "blurry");
        assert_eq!(record.revision, 1);
    }

    #[test]
    fn identical_writes_still_bump() {
        let store = PreviewStore::new();
        let before = store.signal("7");
        store.write("7", PreviewPatch::url("https://image.civitai.com/a.png"));
        let first = store.signal("7");
        store.write("7", PreviewPatch::url("https://image.civitai.com/a.png"));
        let second = store.signal("7");
        assert_ne!(before, first);
        assert_ne!(first, second);
    }

    #[test]
    fn partial_write_keeps_other_fields() {
        let store = PromptStore::new();
        store.write("n", PromptPatch::both("pos", "neg"));
        store.write(
            "n",
            PromptPatch {
                positive: None,
                negative: Some("new neg".to_string()),
            },
        );
        let record = store.read("n");
        assert_eq!(record.positive, "pos");
        assert_eq!(record.negative, "new neg");
        assert_eq!(record.revision, 2);
    }

    #[test]
    fn revisions_are_per_key() {
        let store = PromptStore::new();
        store.write("a", PromptPatch::both("1", ""));
        store.write("a", PromptPatch::both("2", ""));
        store.write("b", PromptPatch::both("3", ""));
        assert_eq!(store.revision("a"), 2);
        assert_eq!(store.revision("b"), 1);
    }

    #[test]
    fn concurrent_writes_lose_no_updates() {
        let store = Arc::new(PromptStore::new());
        let mut handles = vec![];
        for i in 0..8 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for j in 0..50 {
                    store.write("shared", PromptPatch::both(format!("{}-{}", i, j), ""));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.revision("shared"), 400);
    }

    #[tokio::test]
    async fn writes_publish_events() {
        let store = PreviewStore::new();
        let mut events = store.subscribe();
        store.write("9", PreviewPatch::url("u"));
        let event = events.recv().await.unwrap();
        assert_eq!(event.store, StoreKind::Preview);
        assert_eq!(event.node_id, "9");
        assert_eq!(event.revision, 1);
    }

    #[test]
    fn concurrent_writers_publish_revisions_in_order() {
        let store = Arc::new(PromptStore::new());
        let mut events = store.subscribe();
        let mut handles = vec![];
        for i in 0..4 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for j in 0..50 {
                    store.write("shared", PromptPatch::both(format!("{}-{}", i, j), ""));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let revisions: Vec<Revision> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| event.revision)
            .collect();
        assert_eq!(revisions, (1..=200).collect::<Vec<Revision>>());
    }

    #[test]
    fn soft_capacity_never_evicts() {
        let store = PreviewStore::with_soft_capacity(2);
        for i in 0..5 {
            store.write(&i.to_string(), PreviewPatch::url("u"));
        }
        assert_eq!(store.len(), 5);
        assert_eq!(store.revision("0"), 1);
    }

    #[test]
    fn bundle_routes_signal_by_kind() {
        let stores = GalleryStores::new();
        stores.prompts.write("x", PromptPatch::both("p", "n"));
        assert_eq!(stores.signal(StoreKind::Prompt, "x"), "1");
        assert_eq!(stores.signal(StoreKind::Preview, "x"), "0");
    }

    proptest! {
        #[test]
        fn n_writes_give_revision_n(writes in proptest::collection::vec(("[a-z]{0,8}", proptest::option::of("[a-z]{0,8}")), 1..40)) {
            let store = PromptStore::new();
            let n = writes.len() as u64;
            let mut last_negative = String::new();
            for (positive, negative) in writes {
                if let Some(ref neg) = negative {
                    last_negative = neg.clone();
                }
                store.write("k", PromptPatch { positive: Some(positive), negative });
            }
            prop_assert_eq!(store.revision("k"), n);
            prop_assert_eq!(store.signal("k"), n.to_string());
            prop_assert_eq!(store.read("k").negative, last_negative);
        }
    }
}
