//! Script composer: writes script text the parser reads back.
//!
//! Generated node bodies are wrapped in node delimiters, and each node gets
//! the navigation footer its outgoing edges imply.

use crate::core::graph::StoryGraph;
use crate::schema::node::NodeId;

/// Builds script documents node by node.
#[derive(Debug)]
pub struct ScriptComposer<'a> {
    graph: &'a StoryGraph,
    out: String,
}

impl<'a> ScriptComposer<'a> {
    pub fn new(graph: &'a StoryGraph) -> Self {
        Self {
            graph,
            out: String::new(),
        }
    }

    /// The `=== Node: id ===` delimiter line.
    pub fn header(id: &NodeId) -> String {
        format!("=== Node: {} ===", id)
    }

    /// Navigation implied by the graph: a single auto edge becomes a jump,
    /// anything else a numbered choice block. Leaves get nothing.
    pub fn footer(&self, id: &NodeId) -> String {
        let children = self.graph.children(id);
        match children {
            [] => String::new(),
            [(child, None)] => format!("[JUMP: {}]\n", child),
            _ => {
                let mut footer = String::from("[CHOICE]\n");
                for (i, (child, text)) in children.iter().enumerate() {
                    let label = text.as_deref().unwrap_or(child.as_str());
                    footer.push_str(&format!("{}. {} -> {}\n", i + 1, label, child));
                }
                footer
            }
        }
    }

    /// Append one node: header, `body`, then the footer.
    pub fn push_node(&mut self, id: &NodeId, body: &str) -> &mut Self {
        self.out.push_str(&Self::header(id));
        self.out.push('\n');
        let body = body.trim_end();
        if !body.is_empty() {
            self.out.push_str(body);
            self.out.push('\n');
        }
        self.out.push_str(&self.footer(id));
        self.out.push('\n');
        self
    }

    pub fn finish(self) -> String {
        self.out
    }

    /// A skeleton document in topological order: every node's summary as
    /// narration, followed by its footer. Falls back to insertion order when
    /// the graph has a cycle.
    pub fn skeleton(graph: &StoryGraph, narrator_id: &str) -> String {
        let order = graph
            .topological_sort()
            .unwrap_or_else(|_| graph.nodes().map(|n| n.id.clone()).collect());
        let mut composer = ScriptComposer::new(graph);
        for id in &order {
            let summary = graph.node(id).map(|n| n.summary.as_str()).unwrap_or_default();
            let body = if summary.is_empty() {
                String::new()
            } else {
                format!("<content id=\"{}\">{}</content>", narrator_id, summary)
            };
            composer.push_node(id, &body);
        }
        composer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::ScriptParser;
    use crate::schema::instruction::ScriptInstruction;
    use crate::schema::node::{StoryEdge, StoryNode};

    fn graph() -> StoryGraph {
        let mut graph = StoryGraph::new();
        for id in ["root", "A", "B", "C"] {
            graph.add_node(StoryNode::new(id, format!("summary of {}", id)));
        }
        graph.add_edge(StoryEdge::auto("root", "A"));
        graph.add_edge(StoryEdge::choice("A", "B", "Go on"));
        graph.add_edge(StoryEdge::auto("A", "C"));
        graph
    }

    #[test]
    fn footers_follow_edges() {
        let graph = graph();
        let composer = ScriptComposer::new(&graph);
        assert_eq!(composer.footer(&NodeId::from("root")), "[JUMP: A]\n");
        assert_eq!(
            composer.footer(&NodeId::from("A")),
            "[CHOICE]\n1. Go on -> B\n2. C -> C\n"
        );
        assert_eq!(composer.footer(&NodeId::from("B")), "");
    }

    #[test]
    fn single_choice_edge_is_still_a_menu() {
        let mut graph = StoryGraph::new();
        graph.add_node(StoryNode::new("root", "r"));
        graph.add_node(StoryNode::new("B", "b"));
        graph.add_edge(StoryEdge::choice("root", "B", "go"));
        let composer = ScriptComposer::new(&graph);
        assert_eq!(composer.footer(&NodeId::from("root")), "[CHOICE]\n1. go -> B\n");
    }

    #[test]
    fn composed_text_parses_back() {
        let graph = graph();
        let mut composer = ScriptComposer::new(&graph);
        composer
            .push_node(&NodeId::from("root"), "Mio: Hello.\n")
            .push_node(&NodeId::from("A"), "<scene>Park</scene>");
        let text = composer.finish();

        let report = ScriptParser::default().parse_with_report(&text);
        assert!(report.anomalies.is_empty(), "{:?}", report.anomalies);
        let root = report.script.get(&NodeId::from("root")).unwrap();
        assert_eq!(root.last(), Some(&ScriptInstruction::Jump(NodeId::from("A"))));
        let a = report.script.get(&NodeId::from("A")).unwrap();
        assert_eq!(a[1], ScriptInstruction::ChoiceStart);
        assert_eq!(
            a[2],
            ScriptInstruction::ChoiceOption {
                index: 1,
                text: "Go on".to_string(),
                target: Some(NodeId::from("B")),
            }
        );
    }

    #[test]
    fn pushed_node_layout() {
        let graph = graph();
        let mut composer = ScriptComposer::new(&graph);
        composer
            .push_node(&NodeId::from("A"), "Mio: Hi.\n\n")
            .push_node(&NodeId::from("C"), "");
        assert_eq!(
            composer.finish(),
            "=== Node: A ===\nMio: Hi.\n[CHOICE]\n1. Go on -> B\n2. C -> C\n\n=== Node: C ===\n\n"
        );
    }

    #[test]
    fn skeleton_covers_every_node() {
        let graph = graph();
        let text = ScriptComposer::skeleton(&graph, "narrator");
        let script = ScriptParser::default().parse(&text);
        assert_eq!(script.len(), 4);
        assert_eq!(
            script.get(&NodeId::from("B")).unwrap(),
            &[ScriptInstruction::Narration("summary of B".to_string())]
        );
        assert!(text.find("=== Node: root ===").unwrap() < text.find("=== Node: A ===").unwrap());
    }
}
