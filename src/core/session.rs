//! Playback session: all mutable state of one playthrough.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use crate::schema::node::NodeId;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Running,
    AwaitingChoice,
    Finished,
}

/// The portrait currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portrait {
    pub speaker: String,
    pub expression: String,
}

/// What a renderer should currently be showing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayedState {
    /// `None` for narration.
    pub speaker: Option<String>,
    pub text: Option<String>,
    pub image: Option<Portrait>,
    pub background: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionBranch {
    Then,
    Else,
}

/// An `If` body the interpreter is currently executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionFrame {
    /// Instruction index of the `If` that opened this frame.
    pub opened_at: usize,
    pub branch: ConditionBranch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub text: String,
    pub target: Option<NodeId>,
}

/// The options on offer while awaiting a choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceMenu {
    pub options: Vec<MenuOption>,
    /// Where playback resumes when an option without a target is picked.
    pub resume_at: usize,
}

impl ChoiceMenu {
    pub fn texts(&self) -> Vec<String> {
        self.options.iter().map(|o| o.text.clone()).collect()
    }
}

/// A resolved player choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRecord {
    pub node: NodeId,
    pub text: String,
    pub target: Option<NodeId>,
}

/// Position and display state of a single playthrough.
///
/// Owned by exactly one player; dropping it ends the playthrough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub current_node: NodeId,
    pub instruction_pointer: usize,
    pub condition_stack: Vec<ConditionFrame>,
    pub displayed: DisplayedState,
    pub state: PlaybackState,
    /// Set while a line is displayed and waiting for an advance signal.
    pub awaiting_advance: bool,
    pub menu: Option<ChoiceMenu>,
    pub history: Vec<ChoiceRecord>,
    /// Nodes entered, in order, starting with the first.
    pub visited: Vec<NodeId>,
    /// Roles already reported as having no level.
    #[serde(default)]
    pub unknown_roles: BTreeSet<String>,
}

impl PlaybackSession {
    pub fn new(start: impl Into<NodeId>) -> Self {
        let start = start.into();
        Self {
            current_node: start.clone(),
            instruction_pointer: 0,
            condition_stack: Vec::new(),
            displayed: DisplayedState::default(),
            state: PlaybackState::Running,
            awaiting_advance: false,
            menu: None,
            history: Vec::new(),
            visited: vec![start],
            unknown_roles: BTreeSet::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == PlaybackState::Finished
    }

    /// Move to the start of another node. The condition stack belongs to the
    /// node being left and is cleared.
    pub(crate) fn enter_node(&mut self, target: NodeId) {
        self.current_node = target.clone();
        self.instruction_pointer = 0;
        self.condition_stack.clear();
        self.menu = None;
        self.awaiting_advance = false;
        self.state = PlaybackState::Running;
        self.visited.push(target);
    }

    pub fn to_ron_string(&self) -> Result<String, SaveError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn from_ron_str(input: &str) -> Result<Self, SaveError> {
        Ok(ron::from_str(input)?)
    }

    /// Write the session to a RON save file.
    pub fn save(&self, path: &Path) -> Result<(), SaveError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// Load a session from a RON save file.
    pub fn load(path: &Path) -> Result<Self, SaveError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_running_at_node() {
        let session = PlaybackSession::new("root");
        assert_eq!(session.current_node, NodeId::from("root"));
        assert_eq!(session.instruction_pointer, 0);
        assert_eq!(session.state, PlaybackState::Running);
        assert_eq!(session.visited, vec![NodeId::from("root")]);
        assert!(!session.is_finished());
    }

    #[test]
    fn enter_node_resets_position() {
        let mut session = PlaybackSession::new("root");
        session.instruction_pointer = 7;
        session.condition_stack.push(ConditionFrame {
            opened_at: 2,
            branch: ConditionBranch::Then,
        });
        session.enter_node(NodeId::from("node1"));
        assert_eq!(session.current_node, NodeId::from("node1"));
        assert_eq!(session.instruction_pointer, 0);
        assert!(session.condition_stack.is_empty());
        assert_eq!(session.visited.len(), 2);
    }

    #[test]
    fn ron_round_trip() {
        let mut session = PlaybackSession::new("root");
        session.instruction_pointer = 3;
        session.displayed.image = Some(Portrait {
            speaker: "Mio".to_string(),
            expression: "smile".to_string(),
        });
        session.state = PlaybackState::AwaitingChoice;
        session.menu = Some(ChoiceMenu {
            options: vec![MenuOption {
                text: "Wait".to_string(),
                target: None,
            }],
            resume_at: 5,
        });
        session.history.push(ChoiceRecord {
            node: NodeId::from("root"),
            text: "Go".to_string(),
            target: Some(NodeId::from("node1")),
        });

        let text = session.to_ron_string().unwrap();
        let loaded = PlaybackSession::from_ron_str(&text).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn save_and_load_file() {
        let session = PlaybackSession::new("root");
        let path = std::env::temp_dir().join("story_engine_session_test.ron");

        session.save(&path).unwrap();
        let loaded = PlaybackSession::load(&path).unwrap();
        assert_eq!(loaded, session);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_rejects_garbage() {
        assert!(matches!(
            PlaybackSession::from_ron_str("not a session"),
            Err(SaveError::Ron(_))
        ));
    }
}
