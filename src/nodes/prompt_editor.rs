use crate::store::PromptStore;
use std::sync::Arc;

/// Emits the prompt pair the browser last pushed for this node.
#[derive(Clone)]
pub struct PromptEditorNode {
    prompts: Arc<PromptStore>,
}

impl PromptEditorNode {
    pub fn new(prompts: Arc<PromptStore>) -> Self {
        Self { prompts }
    }

    pub fn is_changed(&self, node_id: &str) -> String {
        self.prompts.signal(node_id)
    }

    /// `(positive, negative)`; both empty for a node never written.
    pub fn run(&self, node_id: &str) -> (String, String) {
        let record = self.prompts.read(node_id);
        (record.positive, record.negative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeGate;
    use crate::store::PromptPatch;

    #[test]
    fn reruns_only_after_a_write() {
        let prompts = Arc::new(PromptStore::new());
        let node = PromptEditorNode::new(prompts.clone());
        let mut gate = ChangeGate::new();

        assert!(gate.should_run(prompts.as_ref(), "7"));
        assert_eq!(node.run("7"), (String::new(), String::new()));
        assert!(!gate.should_run(prompts.as_ref(), "7"));

        prompts.write("7", PromptPatch::both("castle", "blurry"));
        assert_eq!(node.is_changed("7"), "1");
        assert!(gate.should_run(prompts.as_ref(), "7"));
        assert_eq!(
            node.run("7"),
            ("castle".to_string(), "blurry".to_string())
        );
    }
}
