//! Non-fatal content problems.
//!
//! Script text is usually machine generated and drifts from the format in
//! small ways. None of these stop parsing or playback: they are logged and
//! reported, then the offending piece is skipped.

use thiserror::Error;
use tracing::warn;

use crate::schema::node::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentAnomaly {
    #[error("node {node}, line {line_no}: unrecognized line '{line}'")]
    UnrecognizedLine {
        node: NodeId,
        line_no: usize,
        line: String,
    },
    #[error("line {line_no} is outside any node: '{line}'")]
    LineOutsideNode { line_no: usize, line: String },
    #[error("node {0} is defined more than once; keeping the last definition")]
    DuplicateNode(NodeId),
    #[error("node {node}: {detail}")]
    UnbalancedConditional { node: NodeId, detail: String },
    #[error("node {node}: choice block at instruction {at} has no options")]
    EmptyChoiceBlock { node: NodeId, at: usize },
    #[error("no progression value for role '{0}', treating it as level 0")]
    UnknownRole(String),
    #[error("node {0} has no script")]
    EmptyNode(NodeId),
}

impl ContentAnomaly {
    pub fn log(&self) {
        warn!(anomaly = %self, "content anomaly");
    }
}
