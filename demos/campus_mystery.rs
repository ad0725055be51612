/// Campus Mystery example: a small branching story with a merge point.
///
/// root → (investigate | ignore) → festival (merge) → (confess | leave)
///
/// Prints the generation plan with each node's memory, then plays the story
/// twice with different character levels to show the conditional branches.
///
/// Run with: cargo run --example campus_mystery

use story_engine::core::engine::StoryEngine;
use story_engine::core::interpreter::PlaybackObserver;
use story_engine::core::progression::CharacterLevels;
use story_engine::core::session::PlaybackState;
use story_engine::schema::design::DesignDocument;
use story_engine::schema::node::NodeId;

const DESIGN: &str = r#"{
    "nodes": {
        "root": {"id": "root", "summary": "Mio finds a torn letter in the library", "type": "normal"},
        "investigate": {"id": "investigate", "summary": "Mio and Ren search the old club room", "type": "normal"},
        "ignore": {"id": "ignore", "summary": "Mio hands the letter to the teacher", "type": "normal"},
        "festival": {"id": "festival", "summary": "The school festival opens", "type": "merge"},
        "confess": {"id": "confess", "summary": "Ren admits writing the letter", "type": "normal"},
        "leave": {"id": "leave", "summary": "Mio leaves the festival early", "type": "normal"}
    },
    "edges": [
        {"from": "root", "to": "investigate", "choice_text": "Look into it"},
        {"from": "root", "to": "ignore", "choice_text": "Let it go"},
        {"from": "investigate", "to": "festival", "choice_text": null},
        {"from": "ignore", "to": "festival", "choice_text": null},
        {"from": "festival", "to": "confess", "choice_text": "Wait for Ren"},
        {"from": "festival", "to": "leave", "choice_text": "Go home"}
    ]
}"#;

const SCRIPT: &str = r#"
=== Node: root ===
<scene>Library</scene>
<content id="narrator">Between two returned books, a letter folded in half.</content>
<image id="Mio">surprised</image>
<content id="Mio">"To whoever finds this"... that's all that's left.</content>
[CHOICE]
1. Look into it -> investigate
2. Let it go -> ignore

=== Node: investigate ===
<scene>Old club room</scene>
<image id="Ren">nervous</image>
<content id="Ren">Why would anyone come up here?</content>
[JUMP: festival]

=== Node: ignore ===
<content id="narrator">The teacher pockets the letter without a word.</content>
[JUMP: festival]

=== Node: festival ===
<scene>Courtyard</scene>
<image id="Mio">none</image>
[IF: Ren >= 3]
<content id="Ren">Mio! Save me a seat at the play.</content>
[ELSE]
<content id="narrator">Ren is nowhere to be seen.</content>
[ENDIF]
[CHOICE]
1. Wait for Ren -> confess
2. Go home -> leave

=== Node: confess ===
<image id="Ren">blush</image>
<content id="Ren">The letter... it was mine.</content>

=== Node: leave ===
<content id="narrator">The lanterns fade behind her.</content>
"#;

/// Prints lines and always picks the first menu option.
#[derive(Default)]
struct Transcript {
    lines: Vec<String>,
}

impl PlaybackObserver for Transcript {
    fn on_scene_change(&mut self, background: &str) {
        self.lines.push(format!("[{}]", background));
    }

    fn on_line(&mut self, speaker: Option<&str>, text: &str) {
        match speaker {
            Some(name) => self.lines.push(format!("{}: {}", name, text)),
            None => self.lines.push(format!("  {}", text)),
        }
    }

    fn on_choices(&mut self, options: &[String]) {
        self.lines.push(format!("  > {}", options.join(" | ")));
    }
}

fn main() {
    let design = DesignDocument::parse_json(DESIGN).expect("Failed to parse design");
    let engine = StoryEngine::builder()
        .with_design(design)
        .with_script_text(SCRIPT)
        .build()
        .expect("Failed to build engine");

    // --- Generation plan: visitation order and memory per node ---
    println!("=== Generation plan ===\n");
    for step in engine.generation_plan().expect("graph is acyclic") {
        println!("{}: {}", step.node, step.summary);
        for line in step.memory.lines() {
            println!("    | {}", line);
        }
    }

    // The merge point only remembers what both branches share
    let festival = engine
        .memory_for(&NodeId::from("festival"))
        .expect("festival exists");
    assert!(!festival.contains("club room"));

    let report = engine.lint();
    println!(
        "\nLint: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );

    // --- Two playthroughs: Ren distant, then Ren close ---
    for ren_level in [1, 4] {
        let mut levels = CharacterLevels::new();
        levels.set("Ren", ren_level);

        let interpreter = engine.interpreter(&levels);
        let mut session = engine.new_session();
        let mut transcript = Transcript::default();

        let mut state = interpreter
            .step(&mut session, &mut transcript)
            .expect("playback failed");
        while state != PlaybackState::Finished {
            state = match state {
                PlaybackState::AwaitingChoice => interpreter.choose(&mut session, 0, &mut transcript),
                _ => interpreter.advance(&mut session, &mut transcript),
            }
            .expect("playback failed");
        }

        println!("\n=== Playthrough with Ren at level {} ===\n", ren_level);
        for line in &transcript.lines {
            println!("{}", line);
        }
        let path: Vec<&str> = session.visited.iter().map(|id| id.as_str()).collect();
        println!("\nPath: {}", path.join(" -> "));
    }
}
