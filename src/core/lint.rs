//! Static checks of a script against its graph.

use rustc_hash::FxHashSet;

use crate::core::graph::StoryGraph;
use crate::core::script::StoryScript;
use crate::schema::node::NodeId;

/// Errors make a script unplayable; warnings are worth a look.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

pub fn lint(graph: &StoryGraph, script: &StoryScript, root: &NodeId) -> LintReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Err(e) = graph.validate() {
        errors.push(format!("Graph is invalid: {}", e));
    }

    // Coverage: every graph node should have content and vice versa
    for node in graph.nodes() {
        if !script.contains(&node.id) {
            warnings.push(format!("Node '{}' has no script", node.id));
        }
    }
    for id in script.node_ids() {
        if !graph.contains(id) {
            warnings.push(format!("Script defines node '{}' which is not in the graph", id));
        }
    }

    for id in graph.kind_mismatches() {
        warnings.push(format!(
            "Node '{}' declares a type that disagrees with its {} parent(s)",
            id,
            graph.parents(&id).len()
        ));
    }

    if graph.contains(root) {
        for id in graph.unreachable_from(root) {
            warnings.push(format!("Node '{}' is unreachable from '{}'", id, root));
        }
    }
    for id in graph.sources() {
        if &id != root {
            warnings.push(format!("Node '{}' has no parents but is not the root", id));
        }
    }

    // Navigation targets
    for (id, instructions) in script.iter() {
        let children: FxHashSet<&NodeId> = graph.children(id).iter().map(|(child, _)| child).collect();
        let mut navigates = false;

        for target in instructions.iter().filter_map(|i| i.navigation_target()) {
            navigates = true;
            if !graph.contains(target) {
                errors.push(format!("Node '{}' navigates to non-existent node '{}'", id, target));
            } else if !children.contains(target) {
                warnings.push(format!(
                    "Node '{}' navigates to '{}' which is not one of its children",
                    id, target
                ));
            }
        }

        if !navigates && !children.is_empty() {
            warnings.push(format!(
                "Node '{}' has {} child node(s) but its script never navigates",
                id,
                children.len()
            ));
        }
    }

    LintReport { errors, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::ScriptParser;
    use crate::schema::node::{NodeKind, StoryEdge, StoryNode};

    fn graph() -> StoryGraph {
        let mut graph = StoryGraph::new();
        graph.add_node(StoryNode::new("root", "start"));
        graph.add_node(StoryNode::new("A", "a"));
        graph.add_node(StoryNode::new("B", "b"));
        graph.add_edge(StoryEdge::auto("root", "A"));
        graph.add_edge(StoryEdge::choice("A", "B", "go"));
        graph
    }

    #[test]
    fn clean_script_passes() {
        let script = ScriptParser::default().parse(
            "=== Node: root ===\n[JUMP: A]\n=== Node: A ===\n[CHOICE]\n1. go -> B\n=== Node: B ===\nMio: end\n",
        );
        let report = lint(&graph(), &script, &NodeId::from("root"));
        assert!(report.is_clean(), "{:?}", report);
    }

    #[test]
    fn unknown_target_is_an_error() {
        let script = ScriptParser::default().parse(
            "=== Node: root ===\n[JUMP: ghost]\n=== Node: A ===\n[JUMP: B]\n=== Node: B ===\nMio: end\n",
        );
        let report = lint(&graph(), &script, &NodeId::from("root"));
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("ghost"));
    }

    #[test]
    fn coverage_and_structure_warnings() {
        let mut graph = graph();
        graph.add_node(StoryNode::new("orphan", "never reached").with_kind(NodeKind::Merge));
        let script = ScriptParser::default().parse(
            "=== Node: root ===\n[JUMP: B]\n=== Node: extra ===\nMio: hi\n=== Node: A ===\nMio: no way out\n",
        );
        let report = lint(&graph, &script, &NodeId::from("root"));
        assert!(report.errors.is_empty());
        let has = |needle: &str| report.warnings.iter().any(|w| w.contains(needle));
        assert!(has("Node 'B' has no script"));
        assert!(has("'extra' which is not in the graph"));
        assert!(has("Node 'orphan' declares a type"));
        assert!(has("Node 'orphan' is unreachable"));
        assert!(has("Node 'orphan' has no parents"));
        assert!(has("navigates to 'B' which is not one of its children"));
        assert!(has("Node 'A' has 1 child node(s)"));
    }

    #[test]
    fn invalid_graph_is_reported() {
        let mut graph = graph();
        graph.add_edge(StoryEdge::auto("B", "root"));
        let report = lint(&graph, &StoryScript::new(), &NodeId::from("root"));
        assert!(report.errors[0].contains("cycle"));
    }
}
