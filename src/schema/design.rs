//! The design document: the JSON shape a story graph is authored in.
//!
//! ```json
//! {
//!   "nodes": { "root": { "id": "root", "summary": "...", "type": "normal" } },
//!   "edges": [ { "from": "root", "to": "node1", "choice_text": null } ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use super::node::{NodeKind, StoryEdge};

#[derive(Debug, Error)]
pub enum DesignError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A node entry as written in the design document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Usually repeats the map key. The key wins when the two disagree.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
}

/// The `{nodes, edges}` document a `StoryGraph` is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignDocument {
    pub nodes: BTreeMap<String, NodeSpec>,
    #[serde(default)]
    pub edges: Vec<StoryEdge>,
}

impl DesignDocument {
    /// Load a design document from a JSON file.
    pub fn load_from_json(path: &Path) -> Result<DesignDocument, DesignError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_json(&contents)
    }

    /// Parse a design document from a JSON string.
    pub fn parse_json(input: &str) -> Result<DesignDocument, DesignError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, DesignError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
