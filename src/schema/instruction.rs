use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// One playable operation in a node's instruction stream.
///
/// Produced by the script parser, consumed by the interpreter. Adding a
/// variant here is meant to break every exhaustive `match` that consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptInstruction {
    /// Switch background/location: `<scene>name</scene>`.
    Scene(String),
    /// Show a character portrait: `<image id="speaker">expression</image>`.
    Image { speaker: String, expression: String },
    /// Remove the current portrait.
    ImageClear,
    /// Narrator text with no speaker.
    Narration(String),
    /// A character line.
    Dialogue { speaker: String, text: String },
    /// `[IF: role >= level]`
    ConditionIf { role: String, level: i32 },
    /// `[ELSE]`
    ConditionElse,
    /// `[ENDIF]`
    ConditionEndIf,
    /// `[JUMP: node]`, moves the session to another node.
    Jump(NodeId),
    /// `[CHOICE]`, opens a block of options.
    ChoiceStart,
    /// A menu entry. `index` is the label the author wrote (or its position
    /// in the run when none was written); `target` is `None` for options that
    /// only continue the current node.
    ChoiceOption {
        index: usize,
        text: String,
        target: Option<NodeId>,
    },
}

impl ScriptInstruction {
    /// True for `Narration` and `Dialogue`, the instructions that wait for
    /// an advance signal.
    pub fn is_line(&self) -> bool {
        matches!(self, Self::Narration(_) | Self::Dialogue { .. })
    }

    /// The node this instruction can navigate to, if any.
    pub fn navigation_target(&self) -> Option<&NodeId> {
        match self {
            Self::Jump(target) => Some(target),
            Self::ChoiceOption { target, .. } => target.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_wait_for_advance() {
        assert!(ScriptInstruction::Narration("Rain.".to_string()).is_line());
        assert!(ScriptInstruction::Dialogue {
            speaker: "Mio".to_string(),
            text: "Hi.".to_string()
        }
        .is_line());
        assert!(!ScriptInstruction::Scene("Library".to_string()).is_line());
        assert!(!ScriptInstruction::ConditionEndIf.is_line());
    }

    #[test]
    fn navigation_targets() {
        let jump = ScriptInstruction::Jump(NodeId::from("node2"));
        assert_eq!(jump.navigation_target(), Some(&NodeId::from("node2")));

        let stay = ScriptInstruction::ChoiceOption {
            index: 1,
            text: "Wait".to_string(),
            target: None,
        };
        assert_eq!(stay.navigation_target(), None);
        assert_eq!(ScriptInstruction::ChoiceStart.navigation_target(), None);
    }
}
