//! Engine configuration, loaded from RON.
//!
//! Every field has a default so a config file only needs to name what it
//! overrides:
//!
//! ```ron
//! (
//!     root_id: "start",
//!     memory: (max_chars: 800),
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::graph::DEFAULT_ROOT;
use crate::schema::node::NodeId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Id of the node every playthrough starts at.
    pub root_id: NodeId,
    pub script: ScriptConfig,
    pub memory: MemoryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_id: NodeId::from(DEFAULT_ROOT),
            script: ScriptConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}

/// Parser settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// `<content id="...">` ids that produce narration instead of dialogue.
    /// Compared case-insensitively.
    pub narrator_ids: Vec<String>,
    /// Image contents that clear the portrait. An empty body always clears.
    pub clear_tokens: Vec<String>,
    /// Longest speaker name (in chars) accepted on a legacy `speaker: text` line.
    pub max_legacy_speaker_chars: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            narrator_ids: vec!["旁白".to_string(), "narrator".to_string()],
            clear_tokens: vec!["none".to_string(), "无".to_string()],
            max_legacy_speaker_chars: 12,
        }
    }
}

impl ScriptConfig {
    pub fn is_narrator(&self, id: &str) -> bool {
        self.narrator_ids.iter().any(|n| n.eq_ignore_ascii_case(id))
    }

    pub fn is_clear_token(&self, expression: &str) -> bool {
        expression.is_empty() || self.clear_tokens.iter().any(|t| t.eq_ignore_ascii_case(expression))
    }
}

/// Memory (generation context) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Upper bound on a memory string, in chars. Entries earliest in
    /// topological order are dropped first.
    pub max_chars: usize,
    /// Memory for a merge point whose parents share no ancestor.
    pub converge_sentinel: String,
    /// Memory for a node with no parents.
    pub opening_text: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_chars: 2000,
            converge_sentinel: "Multiple paths converge here.".to_string(),
            opening_text: "The story begins.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ron_gives_defaults() {
        let config = EngineConfig::parse_ron("()").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.root_id, NodeId::from("root"));
    }

    #[test]
    fn partial_override() {
        let config = EngineConfig::parse_ron(
            r#"(
                root_id: "start",
                memory: (max_chars: 80),
                script: (narrator_ids: ["Narrator", "N"]),
            )"#,
        )
        .unwrap();
        assert_eq!(config.root_id, NodeId::from("start"));
        assert_eq!(config.memory.max_chars, 80);
        assert_eq!(config.memory.opening_text, MemoryConfig::default().opening_text);
        assert!(config.script.is_narrator("n"));
        assert!(!config.script.is_narrator("旁白"));
        assert_eq!(config.script.max_legacy_speaker_chars, 12);
    }

    #[test]
    fn narrator_and_clear_tokens() {
        let script = ScriptConfig::default();
        assert!(script.is_narrator("旁白"));
        assert!(script.is_narrator("NARRATOR"));
        assert!(!script.is_narrator("Mio"));
        assert!(script.is_clear_token(""));
        assert!(script.is_clear_token("None"));
        assert!(script.is_clear_token("无"));
        assert!(!script.is_clear_token("smile"));
    }

    #[test]
    fn malformed_ron_is_an_error() {
        assert!(matches!(
            EngineConfig::parse_ron("(root_id: )"),
            Err(ConfigError::Ron(_))
        ));
    }
}
