//! Seeded random playthroughs, for smoke-testing scripts end to end.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::core::anomaly::ContentAnomaly;
use crate::core::interpreter::{Interpreter, PlaybackError, PlaybackObserver};
use crate::core::session::{ChoiceRecord, PlaybackSession, PlaybackState};
use crate::schema::node::NodeId;

pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// What happened during one automatic playthrough.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playthrough {
    pub visited: Vec<NodeId>,
    pub choices: Vec<ChoiceRecord>,
    /// The node playback finished in. `None` if the step limit was hit.
    pub ending: Option<NodeId>,
    /// `(speaker, text)` for every line shown; narration has no speaker.
    pub lines: Vec<(Option<String>, String)>,
    pub anomalies: Vec<ContentAnomaly>,
    pub steps: usize,
}

#[derive(Default)]
struct Collector {
    lines: Vec<(Option<String>, String)>,
    anomalies: Vec<ContentAnomaly>,
}

impl PlaybackObserver for Collector {
    fn on_line(&mut self, speaker: Option<&str>, text: &str) {
        self.lines.push((speaker.map(str::to_string), text.to_string()));
    }

    fn on_anomaly(&mut self, anomaly: &ContentAnomaly) {
        self.anomalies.push(anomaly.clone());
    }
}

/// Advances every line and picks menu options uniformly at random.
pub struct AutoPlayer {
    rng: StdRng,
    max_steps: usize,
}

impl AutoPlayer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Play `session` until it finishes or the step limit is reached.
    pub fn play(
        &mut self,
        interpreter: &Interpreter<'_>,
        session: &mut PlaybackSession,
    ) -> Result<Playthrough, PlaybackError> {
        let mut collector = Collector::default();
        let mut state = interpreter.step(session, &mut collector)?;
        let mut steps = 1;

        while state != PlaybackState::Finished && steps < self.max_steps {
            state = match state {
                PlaybackState::AwaitingChoice => {
                    let available = session.menu.as_ref().map_or(0, |m| m.options.len());
                    if available == 0 {
                        break;
                    }
                    let pick = self.rng.gen_range(0..available);
                    interpreter.choose(session, pick, &mut collector)?
                }
                PlaybackState::Running if session.awaiting_advance => {
                    interpreter.advance(session, &mut collector)?
                }
                PlaybackState::Running => interpreter.step(session, &mut collector)?,
                PlaybackState::Finished => break,
            };
            steps += 1;
        }

        let ending = session.is_finished().then(|| session.current_node.clone());
        match &ending {
            Some(node) => info!(ending = %node, steps, choices = session.history.len(), "playthrough finished"),
            None => warn!(steps, node = %session.current_node, "playthrough hit the step limit"),
        }

        Ok(Playthrough {
            visited: session.visited.clone(),
            choices: session.history.clone(),
            ending,
            lines: collector.lines,
            anomalies: collector.anomalies,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::StoryGraph;
    use crate::core::progression::CharacterLevels;
    use crate::core::script::{ScriptParser, StoryScript};
    use crate::schema::node::{StoryEdge, StoryNode};

    fn fork() -> (StoryGraph, StoryScript) {
        let mut graph = StoryGraph::new();
        for id in ["root", "left", "right"] {
            graph.add_node(StoryNode::new(id, id));
        }
        graph.add_edge(StoryEdge::choice("root", "left", "Left"));
        graph.add_edge(StoryEdge::choice("root", "right", "Right"));
        let script = ScriptParser::default().parse(
            "=== Node: root ===\n\
             Mio: Which way?\n\
             [CHOICE]\n\
             1. Left -> left\n\
             2. Right -> right\n\
             === Node: left ===\n\
             Mio: Left it is.\n\
             === Node: right ===\n\
             Mio: Right it is.\n",
        );
        (graph, script)
    }

    #[test]
    fn reaches_an_ending() {
        let (graph, script) = fork();
        let levels = CharacterLevels::new();
        let interpreter = Interpreter::new(&graph, &script, &levels);
        let mut session = PlaybackSession::new("root");

        let run = AutoPlayer::new(7).play(&interpreter, &mut session).unwrap();
        let ending = run.ending.unwrap();
        assert!(ending.as_str() == "left" || ending.as_str() == "right");
        assert_eq!(run.choices.len(), 1);
        assert_eq!(run.visited.len(), 2);
        assert_eq!(run.lines.len(), 2);
        assert!(run.anomalies.is_empty());
    }

    #[test]
    fn same_seed_same_path() {
        let (graph, script) = fork();
        let levels = CharacterLevels::new();
        let interpreter = Interpreter::new(&graph, &script, &levels);

        for seed in 0..5 {
            let a = AutoPlayer::new(seed)
                .play(&interpreter, &mut PlaybackSession::new("root"))
                .unwrap();
            let b = AutoPlayer::new(seed)
                .play(&interpreter, &mut PlaybackSession::new("root"))
                .unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn different_seeds_cover_both_branches() {
        let (graph, script) = fork();
        let levels = CharacterLevels::new();
        let interpreter = Interpreter::new(&graph, &script, &levels);

        let endings: std::collections::BTreeSet<String> = (0..32)
            .map(|seed| {
                AutoPlayer::new(seed)
                    .play(&interpreter, &mut PlaybackSession::new("root"))
                    .unwrap()
                    .ending
                    .unwrap()
                    .0
            })
            .collect();
        assert_eq!(endings.len(), 2);
    }

    #[test]
    fn stops_at_step_limit() {
        let (graph, script) = fork();
        let levels = CharacterLevels::new();
        let interpreter = Interpreter::new(&graph, &script, &levels);
        let mut session = PlaybackSession::new("root");

        let run = AutoPlayer::new(1)
            .with_max_steps(1)
            .play(&interpreter, &mut session)
            .unwrap();
        assert_eq!(run.ending, None);
        assert_eq!(run.steps, 1);
        assert_eq!(run.lines.len(), 1);
    }
}
