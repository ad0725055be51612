//! Story graph: nodes, edges, derived adjacency, validation and ordering.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeSet, VecDeque};
use thiserror::Error;
use tracing::{debug, warn};

use crate::schema::design::{DesignDocument, NodeSpec};
use crate::schema::node::{NodeId, NodeKind, StoryEdge, StoryNode};

/// The conventional id of the single entry node.
pub const DEFAULT_ROOT: &str = "root";

/// A graph that cannot be generated or played.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("edge {from} -> {to} references unknown node '{missing}'")]
    UnknownEdgeEndpoint {
        from: NodeId,
        to: NodeId,
        missing: NodeId,
    },
    #[error("missing root node '{0}'")]
    MissingRoot(NodeId),
    #[error("graph contains a cycle: only {sorted} of {total} nodes could be ordered")]
    Cycle { sorted: usize, total: usize },
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
}

/// Nodes and edges of a branching story, with forward and reverse
/// adjacency kept in step with the edge list.
///
/// Insertion never checks anything; call [`StoryGraph::validate`] once the
/// graph is fully built.
#[derive(Debug, Clone)]
pub struct StoryGraph {
    root: NodeId,
    nodes: FxHashMap<NodeId, StoryNode>,
    /// Node ids in insertion order, used to make traversals deterministic.
    order: Vec<NodeId>,
    edges: Vec<StoryEdge>,
    forward: FxHashMap<NodeId, Vec<(NodeId, Option<String>)>>,
    reverse: FxHashMap<NodeId, Vec<NodeId>>,
}

impl Default for StoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryGraph {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_ROOT)
    }

    /// An empty graph whose entry node is `root` instead of `"root"`.
    pub fn with_root(root: impl Into<NodeId>) -> Self {
        Self {
            root: root.into(),
            nodes: FxHashMap::default(),
            order: Vec::new(),
            edges: Vec::new(),
            forward: FxHashMap::default(),
            reverse: FxHashMap::default(),
        }
    }

    /// Build a graph from a design document. Map keys are the node ids.
    pub fn from_design(doc: &DesignDocument, root: impl Into<NodeId>) -> Self {
        let mut graph = Self::with_root(root);
        for (key, spec) in &doc.nodes {
            if !spec.id.is_empty() && spec.id != *key {
                warn!(key = %key, id = %spec.id, "node id disagrees with its map key; using the key");
            }
            graph.add_node(StoryNode {
                id: NodeId::new(key.clone()),
                summary: spec.summary.clone(),
                kind: spec.kind,
            });
        }
        for edge in &doc.edges {
            graph.add_edge(edge.clone());
        }
        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "loaded story graph"
        );
        graph
    }

    /// Convert back into the design document shape.
    pub fn to_design(&self) -> DesignDocument {
        let nodes = self
            .nodes()
            .map(|node| {
                (
                    node.id.0.clone(),
                    NodeSpec {
                        id: node.id.0.clone(),
                        summary: node.summary.clone(),
                        kind: node.kind,
                    },
                )
            })
            .collect();
        DesignDocument {
            nodes,
            edges: self.edges.clone(),
        }
    }

    /// Insert a node, replacing any node with the same id.
    pub fn add_node(&mut self, node: StoryNode) {
        if !self.nodes.contains_key(&node.id) {
            self.order.push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Append an edge and update both adjacency views.
    pub fn add_edge(&mut self, edge: StoryEdge) {
        self.forward
            .entry(edge.from.clone())
            .or_default()
            .push((edge.to.clone(), edge.choice_text.clone()));
        self.reverse
            .entry(edge.to.clone())
            .or_default()
            .push(edge.from.clone());
        self.edges.push(edge);
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    pub fn node(&self, id: &NodeId) -> Option<&StoryNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &StoryNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn edges(&self) -> &[StoryEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Outgoing edges of `id` as `(child, choice_text)` pairs.
    pub fn children(&self, id: &NodeId) -> &[(NodeId, Option<String>)] {
        self.forward.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Parents of `id`. A DAG node may have several.
    pub fn parents(&self, id: &NodeId) -> &[NodeId] {
        self.reverse.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// A merge point is any node with more than one parent edge.
    pub fn is_merge_point(&self, id: &NodeId) -> bool {
        self.parents(id).len() > 1
    }

    /// Check edge endpoints, the root node, and acyclicity, in that order.
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), StructuralError> {
        for edge in &self.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !self.nodes.contains_key(endpoint) {
                    return Err(StructuralError::UnknownEdgeEndpoint {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }

        if !self.nodes.contains_key(&self.root) {
            return Err(StructuralError::MissingRoot(self.root.clone()));
        }

        self.topological_sort()?;
        Ok(())
    }

    /// Kahn's algorithm. Every edge's `from` precedes its `to` in the result.
    ///
    /// Fails with [`StructuralError::Cycle`] when fewer nodes are emitted than
    /// exist. Edges touching unknown nodes are ignored here; `validate`
    /// reports them.
    pub fn topological_sort(&self) -> Result<Vec<NodeId>, StructuralError> {
        let mut in_degree: FxHashMap<&NodeId, usize> = self
            .order
            .iter()
            .map(|id| {
                let known_parents = self
                    .parents(id)
                    .iter()
                    .filter(|p| self.nodes.contains_key(*p))
                    .count();
                (id, known_parents)
            })
            .collect();

        let mut queue: VecDeque<&NodeId> = self
            .order
            .iter()
            .filter(|id| in_degree.get(id).copied() == Some(0))
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());

        while let Some(id) = queue.pop_front() {
            sorted.push(id.clone());
            if !self.nodes.contains_key(id) {
                continue;
            }
            for (child, _) in self.children(id) {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }

        if sorted.len() != self.order.len() {
            warn!(
                sorted = sorted.len(),
                total = self.order.len(),
                "story graph contains a cycle"
            );
            return Err(StructuralError::Cycle {
                sorted: sorted.len(),
                total: self.order.len(),
            });
        }
        Ok(sorted)
    }

    /// Every leaf reachable from `from`. Shared subgraphs are visited once.
    pub fn reachable_endings(&self, from: &NodeId) -> Vec<NodeId> {
        if !self.contains(from) {
            return Vec::new();
        }

        let mut visited: FxHashSet<&NodeId> = FxHashSet::default();
        let mut endings = Vec::new();
        let mut stack = vec![from];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let children = self.children(id);
            if children.is_empty() {
                endings.push(id.clone());
            } else {
                // reversed so the first child is explored first
                for (child, _) in children.iter().rev() {
                    if !visited.contains(child) {
                        stack.push(child);
                    }
                }
            }
        }
        endings
    }

    /// All ancestors of `id` (excluding `id`), found by walking parents
    /// breadth-first.
    pub fn ancestors(&self, id: &NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&NodeId> = self.parents(id).iter().collect();
        while let Some(parent) = queue.pop_front() {
            if seen.insert(parent.clone()) {
                queue.extend(self.parents(parent));
            }
        }
        seen
    }

    /// Nodes with no parents. A well-formed story has exactly one: the root.
    pub fn sources(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .filter(|id| self.parents(id).is_empty())
            .cloned()
            .collect()
    }

    /// Nodes that cannot be reached by following edges from `start`.
    pub fn unreachable_from(&self, start: &NodeId) -> Vec<NodeId> {
        let mut seen: FxHashSet<&NodeId> = FxHashSet::default();
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if seen.insert(id) {
                queue.extend(self.children(id).iter().map(|(child, _)| child));
            }
        }
        self.order
            .iter()
            .filter(|id| !seen.contains(id))
            .cloned()
            .collect()
    }

    /// Nodes whose declared `kind` disagrees with their actual parent count.
    pub fn kind_mismatches(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|node| (node.kind == NodeKind::Merge) != self.is_merge_point(&node.id))
            .map(|node| node.id.clone())
            .collect()
    }
}
