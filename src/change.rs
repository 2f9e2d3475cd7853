//! Change-Detection Protocol
//!
//! The host framework asks each node for a comparison token before evaluating
//! it and re-runs the node's compute step only when the token differs from
//! the one it saw last. Tokens are pure O(1) reads of a store revision.

use crate::store::{Record, RevisionedStore};
use crate::types::NodeId;
use std::collections::HashMap;

/// Something that can produce a change token for a node.
pub trait ChangeSignal: Send + Sync {
    fn signal(&self, node_id: &str) -> String;
}

impl<R: Record> ChangeSignal for RevisionedStore<R> {
    fn signal(&self, node_id: &str) -> String {
        RevisionedStore::signal(self, node_id)
    }
}

/// Host-side cache of the last token observed per node.
///
/// Mirrors what the host framework does between evaluations: `should_run`
/// answers true on first sight of a node and whenever its token moved.
#[derive(Debug, Default)]
pub struct ChangeGate {
    last_seen: HashMap<NodeId, String>,
}

impl ChangeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll `source` for `node_id`, record the token, and report whether it changed.
    pub fn should_run(&mut self, source: &dyn ChangeSignal, node_id: &str) -> bool {
        let token = source.signal(node_id);
        match self.last_seen.get(node_id) {
            Some(previous) if *previous == token => false,
            _ => {
                self.last_seen.insert(node_id.to_string(), token);
                true
            }
        }
    }

    /// Last token recorded for `node_id`, if any.
    pub fn last_token(&self, node_id: &str) -> Option<&str> {
        self.last_seen.get(node_id).map(String::as_str)
    }

    /// Drop the cached token so the next poll re-runs the node.
    pub fn forget(&mut self, node_id: &str) {
        self.last_seen.remove(node_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{PreviewPatch, PreviewStore, PromptPatch, PromptStore};

    #[test]
    fn runs_once_then_waits_for_a_write() {
        let store = PromptStore::new();
        let mut gate = ChangeGate::new();

        assert!(gate.should_run(&store, "7"));
        assert!(!gate.should_run(&store, "7"));
        assert_eq!(gate.last_token("7"), Some("0"));

        store.write("7", PromptPatch::both("x", ""));
        assert!(gate.should_run(&store, "7"));
        assert!(!gate.should_run(&store, "7"));
    }

    #[test]
    fn identical_content_still_triggers() {
        let store = PreviewStore::new();
        let mut gate = ChangeGate::new();
        store.write("1", PreviewPatch::url("u"));
        assert!(gate.should_run(&store, "1"));
        store.write("1", PreviewPatch::url("u"));
        assert!(gate.should_run(&store, "1"));
    }

    #[test]
    fn nodes_are_tracked_independently() {
        let store = PromptStore::new();
        let mut gate = ChangeGate::new();
        gate.should_run(&store, "a");
        gate.should_run(&store, "b");
        store.write("a", PromptPatch::both("x", ""));
        assert!(gate.should_run(&store, "a"));
        assert!(!gate.should_run(&store, "b"));
    }

    #[test]
    fn forget_forces_a_rerun() {
        let store = PromptStore::new();
        let mut gate = ChangeGate::new();
        gate.should_run(&store, "a");
        gate.forget("a");
        assert!(gate.should_run(&store, "a"));
    }
}
