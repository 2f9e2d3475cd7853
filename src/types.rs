//! Core types shared by the stores, the change-detection protocol and the routes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// NodeId: opaque identifier the host framework assigns to a node instance
pub type NodeId = String;

/// Revision: per-key monotonic counter used as a change-detection token
pub type Revision = u64;

/// Which of the two revisioned stores a record or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Prompt,
    Preview,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Prompt => "prompt",
            StoreKind::Preview => "preview",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prompt" => Ok(StoreKind::Prompt),
            "preview" => Ok(StoreKind::Preview),
            other => Err(format!(
                "Unknown store '{}' (must be 'prompt' or 'preview')",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_kind_parses_case_insensitively() {
        assert_eq!("Prompt".parse::<StoreKind>().unwrap(), StoreKind::Prompt);
        assert_eq!(" preview ".parse::<StoreKind>().unwrap(), StoreKind::Preview);
        assert!("image".parse::<StoreKind>().is_err());
    }
}
