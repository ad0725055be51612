use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype wrapper for story node IDs ("root", "node1", "1-2", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Declared node type from the design document.
///
/// This is authoring metadata only. Whether a node is a merge point is
/// decided by its parent count in the graph, never by this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Normal,
    Merge,
}

/// A single beat of the story: what happens here, in one summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryNode {
    pub id: NodeId,
    pub summary: String,
    pub kind: NodeKind,
}

impl StoryNode {
    pub fn new(id: impl Into<NodeId>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            kind: NodeKind::Normal,
        }
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }
}

/// A directed transition between two nodes.
///
/// `choice_text == None` means the story advances on its own; otherwise the
/// text is what the player picks to take this edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub choice_text: Option<String>,
}

impl StoryEdge {
    /// An edge taken without a player decision.
    pub fn auto(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            choice_text: None,
        }
    }

    /// An edge taken when the player picks `text`.
    pub fn choice(from: impl Into<NodeId>, to: impl Into<NodeId>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            choice_text: Some(text.into()),
        }
    }
}
