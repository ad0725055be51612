/// Script parser and composer integration tests.

use std::fs;
use std::path::Path;
use story_engine::core::anomaly::ContentAnomaly;
use story_engine::core::compose::ScriptComposer;
use story_engine::core::config::ScriptConfig;
use story_engine::core::graph::{StoryGraph, DEFAULT_ROOT};
use story_engine::core::lint::lint;
use story_engine::core::script::ScriptParser;
use story_engine::schema::design::DesignDocument;
use story_engine::schema::instruction::ScriptInstruction;
use story_engine::schema::node::NodeId;

fn fixture_text() -> String {
    fs::read_to_string("tests/fixtures/story.txt").unwrap()
}

fn fixture_graph() -> StoryGraph {
    let doc = DesignDocument::load_from_json(Path::new("tests/fixtures/design.json")).unwrap();
    StoryGraph::from_design(&doc, DEFAULT_ROOT)
}

#[test]
fn fixture_parses_every_node() {
    let report = ScriptParser::default().parse_with_report(&fixture_text());
    let ids: Vec<&str> = report.script.node_ids().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["node1", "node2", "node3", "node4", "node5", "root"]);
}

#[test]
fn fixture_anomalies_are_reported_not_fatal() {
    let report = ScriptParser::default().parse_with_report(&fixture_text());
    assert_eq!(report.anomalies.len(), 2, "{:?}", report.anomalies);
    assert!(matches!(
        &report.anomalies[0],
        ContentAnomaly::LineOutsideNode { line_no: 1, .. }
    ));
    assert!(report.anomalies.iter().any(|a| matches!(
        a,
        ContentAnomaly::UnrecognizedLine { node, line, .. }
            if node.as_str() == "node2" && line.contains("noise")
    )));

    // the noise line is dropped, the rest of node2 survives
    let node2 = report.script.get(&NodeId::from("node2")).unwrap();
    assert_eq!(node2.len(), 2);
    assert_eq!(node2[1], ScriptInstruction::Jump(NodeId::from("node3")));
}

#[test]
fn root_node_instructions() {
    let script = ScriptParser::default().parse(&fixture_text());
    let root = script.get(&NodeId::from("root")).unwrap();
    assert_eq!(
        root,
        &[
            ScriptInstruction::Scene("Library".to_string()),
            ScriptInstruction::Narration(
                "Between two returned books, a letter folded in half.".to_string()
            ),
            ScriptInstruction::Image {
                speaker: "Mio".to_string(),
                expression: "surprised".to_string()
            },
            ScriptInstruction::Dialogue {
                speaker: "Mio".to_string(),
                text: "To whoever finds this... that's all that's left.".to_string()
            },
            ScriptInstruction::ChoiceStart,
            ScriptInstruction::ChoiceOption {
                index: 1,
                text: "Look into it".to_string(),
                target: Some(NodeId::from("node1"))
            },
            ScriptInstruction::ChoiceOption {
                index: 2,
                text: "Let it go".to_string(),
                target: Some(NodeId::from("node2"))
            },
        ][..]
    );
}

#[test]
fn legacy_dialogue_and_clear_token() {
    let script = ScriptParser::default().parse(&fixture_text());

    let node1 = script.get(&NodeId::from("node1")).unwrap();
    assert_eq!(
        node1[2],
        ScriptInstruction::Dialogue {
            speaker: "Ren".to_string(),
            text: "Why would anyone come up here?".to_string()
        }
    );

    let node3 = script.get(&NodeId::from("node3")).unwrap();
    assert_eq!(node3[1], ScriptInstruction::ImageClear);
    assert_eq!(node3.len(), 13);
}

#[test]
fn nested_conditionals_stay_balanced() {
    let script = ScriptParser::default().parse(&fixture_text());
    for (id, instructions) in script.iter() {
        let mut depth: i32 = 0;
        for instruction in instructions {
            match instruction {
                ScriptInstruction::ConditionIf { .. } => depth += 1,
                ScriptInstruction::ConditionEndIf => depth -= 1,
                _ => {}
            }
            assert!(depth >= 0, "node {}", id);
        }
        assert_eq!(depth, 0, "node {}", id);
    }
}

#[test]
fn tagged_options_without_target_continue_the_node() {
    let script = ScriptParser::default().parse(&fixture_text());
    let node4 = script.get(&NodeId::from("node4")).unwrap();
    assert_eq!(
        node4[3],
        ScriptInstruction::ChoiceOption {
            index: 1,
            text: "Smile".to_string(),
            target: None
        }
    );
    assert_eq!(
        node4[4],
        ScriptInstruction::ChoiceOption {
            index: 2,
            text: "Say nothing".to_string(),
            target: None
        }
    );
    assert_eq!(
        node4[5],
        ScriptInstruction::Narration("The fireworks start.".to_string())
    );
}

#[test]
fn parsing_is_deterministic() {
    let parser = ScriptParser::default();
    let text = fixture_text();
    assert_eq!(parser.parse(&text), parser.parse(&text));
}

#[test]
fn fixture_lints_clean_against_design() {
    let graph = fixture_graph();
    let script = ScriptParser::default().parse(&fixture_text());
    let report = lint(&graph, &script, &NodeId::from(DEFAULT_ROOT));
    assert!(report.is_clean(), "{:?}", report);
}

#[test]
fn skeleton_round_trips_through_parser() {
    let graph = fixture_graph();
    let text = ScriptComposer::skeleton(&graph, "narrator");
    let report = ScriptParser::default().parse_with_report(&text);
    assert!(report.anomalies.is_empty(), "{:?}", report.anomalies);
    assert_eq!(report.script.len(), graph.len());

    // every edge shows up as navigation from its source node
    for edge in graph.edges() {
        let instructions = report.script.get(&edge.from).unwrap();
        assert!(
            instructions
                .iter()
                .any(|i| i.navigation_target() == Some(&edge.to)),
            "{} -> {}",
            edge.from,
            edge.to
        );
    }

    let node1 = report.script.get(&NodeId::from("node1")).unwrap();
    assert_eq!(
        node1,
        &[
            ScriptInstruction::Narration("Mio and Ren search the old club room".to_string()),
            ScriptInstruction::Jump(NodeId::from("node3")),
        ][..]
    );

    assert!(lint(&graph, &report.script, &NodeId::from(DEFAULT_ROOT)).is_clean());
}

#[test]
fn composed_node_body_replaces_cleanly() {
    let graph = fixture_graph();
    let parser = ScriptParser::new(ScriptConfig::default());
    let mut composer = ScriptComposer::new(&graph);
    composer.push_node(
        &NodeId::from("node3"),
        "<scene>Gym</scene>\n<content id=\"Ren\">Over here!</content>",
    );
    let text = composer.finish();

    let (instructions, anomalies) = parser.parse_node_body(&NodeId::from("node3"), &text);
    assert!(anomalies.is_empty(), "{:?}", anomalies);
    assert_eq!(instructions[0], ScriptInstruction::Scene("Gym".to_string()));
    assert_eq!(
        instructions.last(),
        Some(&ScriptInstruction::ChoiceOption {
            index: 2,
            text: "Go home".to_string(),
            target: Some(NodeId::from("node5"))
        })
    );
}
