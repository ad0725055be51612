//! Generation memory: what the story is guaranteed to have told the player
//! by the time a node is reached.
//!
//! A node's memory is built from its *guaranteed ancestors*. For a node with
//! one parent `p` that is `{p}` plus everything guaranteed for `p`. For a
//! merge point it is the intersection of that set over every parent, so an
//! event that happened on only one incoming branch never shows up. Sets are
//! computed in topological order, which keeps content from above an earlier
//! merge from leaking past it.

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::debug;

use crate::core::config::MemoryConfig;
use crate::core::graph::{StoryGraph, StructuralError};
use crate::schema::node::NodeId;

/// One entry of a generation plan: a node in visitation order with the
/// memory its content should be generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationStep {
    pub node: NodeId,
    pub summary: String,
    pub memory: String,
}

/// Precomputed guaranteed-ancestor sets for every node of a graph.
#[derive(Debug)]
pub struct MemoryBuilder<'a> {
    graph: &'a StoryGraph,
    config: &'a MemoryConfig,
    order: Vec<NodeId>,
    /// Index of each node in `order`; lower means earlier in the story.
    position: FxHashMap<NodeId, usize>,
    guaranteed: FxHashMap<NodeId, BTreeSet<NodeId>>,
}

impl<'a> MemoryBuilder<'a> {
    /// Fails only if the graph has a cycle.
    pub fn new(graph: &'a StoryGraph, config: &'a MemoryConfig) -> Result<Self, StructuralError> {
        let order = graph.topological_sort()?;
        let mut guaranteed: FxHashMap<NodeId, BTreeSet<NodeId>> = FxHashMap::default();

        for id in &order {
            let mut common: Option<BTreeSet<NodeId>> = None;
            for parent in graph.parents(id) {
                // edges from unknown nodes were never ordered
                let Some(above) = guaranteed.get(parent) else {
                    continue;
                };
                let mut through_parent = above.clone();
                through_parent.insert(parent.clone());
                common = Some(match common {
                    None => through_parent,
                    Some(acc) => acc.intersection(&through_parent).cloned().collect(),
                });
            }
            let set = common.unwrap_or_default();
            if graph.is_merge_point(id) {
                debug!(node = %id, shared = set.len(), "merge point memory");
            }
            guaranteed.insert(id.clone(), set);
        }

        let position: FxHashMap<NodeId, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        Ok(Self {
            graph,
            config,
            order,
            position,
            guaranteed,
        })
    }

    /// Ancestors every path to `id` passes through.
    pub fn guaranteed_ancestors(&self, id: &NodeId) -> Option<&BTreeSet<NodeId>> {
        self.guaranteed.get(id)
    }

    /// The bounded memory string for `id`.
    pub fn memory_for(&self, id: &NodeId) -> Result<String, StructuralError> {
        let ancestors = self
            .guaranteed
            .get(id)
            .ok_or_else(|| StructuralError::UnknownNode(id.clone()))?;

        if self.graph.parents(id).is_empty() {
            return Ok(self.config.opening_text.clone());
        }
        if ancestors.is_empty() {
            return Ok(self.config.converge_sentinel.clone());
        }

        let entries: Vec<(usize, String)> = ancestors
            .iter()
            .filter_map(|ancestor| self.graph.node(ancestor))
            .map(|node| {
                let age = self.position.get(&node.id).copied().unwrap_or(0);
                (age, format!("[{}] {}", node.id, node.summary))
            })
            .collect();
        Ok(bound_entries(entries, self.config.max_chars))
    }

    /// Every node in topological order with its memory.
    pub fn generation_plan(&self) -> Result<Vec<GenerationStep>, StructuralError> {
        self.order
            .iter()
            .map(|id| {
                let summary = self
                    .graph
                    .node(id)
                    .map(|node| node.summary.clone())
                    .unwrap_or_default();
                Ok(GenerationStep {
                    node: id.clone(),
                    summary,
                    memory: self.memory_for(id)?,
                })
            })
            .collect()
    }
}

/// Join entries (already in display order) with newlines. Entries earliest
/// in topological order are dropped until the result fits in `max_chars`.
/// A single oversized survivor keeps its tail.
fn bound_entries(entries: Vec<(usize, String)>, max_chars: usize) -> String {
    let mut total = entries.iter().map(|(_, e)| e.chars().count()).sum::<usize>()
        + entries.len().saturating_sub(1);

    let mut oldest_first: Vec<usize> = (0..entries.len()).collect();
    oldest_first.sort_by_key(|&i| entries[i].0);

    let mut dropped = vec![false; entries.len()];
    let mut remaining = entries.len();
    for i in oldest_first {
        if remaining <= 1 || total <= max_chars {
            break;
        }
        dropped[i] = true;
        remaining -= 1;
        total -= entries[i].1.chars().count() + 1;
    }

    let joined = entries
        .into_iter()
        .zip(dropped)
        .filter(|(_, dropped)| !dropped)
        .map(|((_, entry), _)| entry)
        .collect::<Vec<_>>()
        .join("\n");
    let len = joined.chars().count();
    if len <= max_chars {
        return joined;
    }
    joined.chars().skip(len - max_chars).collect()
}
