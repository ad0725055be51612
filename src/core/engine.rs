//! The story engine: loads a design and its script, validates them, and
//! hands out memories, sessions and interpreters.
//!
//! Built via `StoryEngine::builder()`.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::anomaly::ContentAnomaly;
use crate::core::config::{ConfigError, EngineConfig};
use crate::core::context::{GenerationStep, MemoryBuilder};
use crate::core::graph::{StoryGraph, StructuralError};
use crate::core::interpreter::Interpreter;
use crate::core::lint::{lint, LintReport};
use crate::core::progression::ProgressionLookup;
use crate::core::script::{ScriptParser, StoryScript};
use crate::core::session::PlaybackSession;
use crate::schema::design::{DesignDocument, DesignError};
use crate::schema::instruction::ScriptInstruction;
use crate::schema::node::NodeId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("design error: {0}")]
    Design(#[from] DesignError),
    #[error("structural error: {0}")]
    Structural(#[from] StructuralError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no design document was provided")]
    MissingDesign,
}

pub struct StoryEngine {
    config: EngineConfig,
    graph: StoryGraph,
    script: StoryScript,
    parser: ScriptParser,
    /// Anomalies found while parsing the initial script.
    anomalies: Vec<ContentAnomaly>,
}

/// Builder for constructing a `StoryEngine`.
pub struct StoryEngineBuilder {
    config: Option<EngineConfig>,
    config_path: Option<PathBuf>,
    design_path: Option<PathBuf>,
    script_path: Option<PathBuf>,
    /// Directly provided design (for testing without files).
    design: Option<DesignDocument>,
    /// Directly provided script text (for testing without files).
    script_text: Option<String>,
}

impl StoryEngine {
    pub fn builder() -> StoryEngineBuilder {
        StoryEngineBuilder {
            config: None,
            config_path: None,
            design_path: None,
            script_path: None,
            design: None,
            script_text: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &StoryGraph {
        &self.graph
    }

    pub fn script(&self) -> &StoryScript {
        &self.script
    }

    pub fn parse_anomalies(&self) -> &[ContentAnomaly] {
        &self.anomalies
    }

    /// Every node in topological order with the memory to generate it from.
    pub fn generation_plan(&self) -> Result<Vec<GenerationStep>, StructuralError> {
        MemoryBuilder::new(&self.graph, &self.config.memory)?.generation_plan()
    }

    pub fn memory_for(&self, id: &NodeId) -> Result<String, StructuralError> {
        MemoryBuilder::new(&self.graph, &self.config.memory)?.memory_for(id)
    }

    /// A fresh session positioned at the root.
    pub fn new_session(&self) -> PlaybackSession {
        PlaybackSession::new(self.config.root_id.clone())
    }

    pub fn interpreter<'a>(&'a self, progression: &'a dyn ProgressionLookup) -> Interpreter<'a> {
        Interpreter::new(&self.graph, &self.script, progression)
    }

    /// Replace a node's whole instruction list with freshly parsed `body`.
    /// Returns the anomalies found in the new body.
    pub fn replace_node_script(
        &mut self,
        id: &NodeId,
        body: &str,
    ) -> Result<Vec<ContentAnomaly>, StructuralError> {
        if !self.graph.contains(id) {
            return Err(StructuralError::UnknownNode(id.clone()));
        }
        let (instructions, anomalies) = self.parser.parse_node_body(id, body);
        for anomaly in &anomalies {
            anomaly.log();
        }
        debug!(node = %id, instructions = instructions.len(), "replaced node script");
        self.script.replace_node(id.clone(), instructions);
        Ok(anomalies)
    }

    /// The current instruction list of a node.
    pub fn node_script(&self, id: &NodeId) -> Option<&[ScriptInstruction]> {
        self.script.get(id)
    }

    pub fn lint(&self) -> LintReport {
        lint(&self.graph, &self.script, &self.config.root_id)
    }
}

impl StoryEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn design_path(mut self, path: impl AsRef<Path>) -> Self {
        self.design_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn script_path(mut self, path: impl AsRef<Path>) -> Self {
        self.script_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Provide the design directly (for testing without files).
    pub fn with_design(mut self, design: DesignDocument) -> Self {
        self.design = Some(design);
        self
    }

    /// Provide script text directly (for testing without files).
    pub fn with_script_text(mut self, text: impl Into<String>) -> Self {
        self.script_text = Some(text.into());
        self
    }

    /// Load everything, parse the script and validate the graph.
    ///
    /// An explicit `config()` wins over `config_path()`; a direct design or
    /// script wins over its path. The script is optional.
    pub fn build(self) -> Result<StoryEngine, EngineError> {
        let config = match (self.config, &self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => EngineConfig::load_from_ron(path)?,
            (None, None) => EngineConfig::default(),
        };

        let design = match (self.design, &self.design_path) {
            (Some(design), _) => design,
            (None, Some(path)) => DesignDocument::load_from_json(path)?,
            (None, None) => return Err(EngineError::MissingDesign),
        };

        let graph = StoryGraph::from_design(&design, config.root_id.clone());
        graph.validate()?;

        let script_text = match (self.script_text, &self.script_path) {
            (Some(text), _) => Some(text),
            (None, Some(path)) => Some(std::fs::read_to_string(path)?),
            (None, None) => None,
        };

        let parser = ScriptParser::new(config.script.clone());
        let (script, anomalies) = match script_text {
            Some(text) => {
                let report = parser.parse_with_report(&text);
                for anomaly in &report.anomalies {
                    anomaly.log();
                }
                (report.script, report.anomalies)
            }
            None => (StoryScript::new(), Vec::new()),
        };

        info!(
            nodes = graph.len(),
            edges = graph.edges().len(),
            scripted = script.len(),
            anomalies = anomalies.len(),
            "story engine ready"
        );

        Ok(StoryEngine {
            config,
            graph,
            script,
            parser,
            anomalies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progression::CharacterLevels;
    use crate::core::session::PlaybackState;
    use crate::schema::node::{StoryEdge, StoryNode};

    fn design() -> DesignDocument {
        let mut graph = StoryGraph::new();
        graph.add_node(StoryNode::new("root", "Arrival"));
        graph.add_node(StoryNode::new("A", "The note"));
        graph.add_edge(StoryEdge::auto("root", "A"));
        graph.to_design()
    }

    #[test]
    fn build_requires_design() {
        assert!(matches!(
            StoryEngine::builder().build(),
            Err(EngineError::MissingDesign)
        ));
    }

    #[test]
    fn build_validates_graph() {
        let mut doc = design();
        doc.edges.push(StoryEdge::auto("A", "ghost"));
        assert!(matches!(
            StoryEngine::builder().with_design(doc).build(),
            Err(EngineError::Structural(StructuralError::UnknownEdgeEndpoint { .. }))
        ));
    }

    #[test]
    fn custom_root_comes_from_config() {
        let config = EngineConfig::parse_ron(r#"(root_id: "A")"#).unwrap();
        // "A" exists, so validation passes even though it has a parent
        let engine = StoryEngine::builder()
            .config(config)
            .with_design(design())
            .build()
            .unwrap();
        assert_eq!(engine.new_session().current_node, NodeId::from("A"));
    }

    #[test]
    fn play_from_builder() {
        let engine = StoryEngine::builder()
            .with_design(design())
            .with_script_text("=== Node: root ===\nMio: Hi.\n[JUMP: A]\n=== Node: A ===\nMio: Bye.\n")
            .build()
            .unwrap();
        let levels = CharacterLevels::new();
        let interpreter = engine.interpreter(&levels);
        let mut session = engine.new_session();

        interpreter.step(&mut session, &mut crate::core::interpreter::NullObserver).unwrap();
        interpreter.advance(&mut session, &mut crate::core::interpreter::NullObserver).unwrap();
        assert_eq!(session.current_node, NodeId::from("A"));
        let state = interpreter
            .advance(&mut session, &mut crate::core::interpreter::NullObserver)
            .unwrap();
        assert_eq!(state, PlaybackState::Finished);
        assert!(engine.lint().is_clean());
    }

    #[test]
    fn replace_node_script_swaps_content() {
        let mut engine = StoryEngine::builder()
            .with_design(design())
            .with_script_text("=== Node: A ===\nMio: Old.\n")
            .build()
            .unwrap();

        let anomalies = engine
            .replace_node_script(&NodeId::from("A"), "=== Node: A ===\nMio: New.\n???\n")
            .unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(
            engine.node_script(&NodeId::from("A")).unwrap(),
            &[ScriptInstruction::Dialogue {
                speaker: "Mio".to_string(),
                text: "New.".to_string()
            }]
        );
        assert!(engine
            .replace_node_script(&NodeId::from("ghost"), "Mio: x")
            .is_err());
    }

    #[test]
    fn memory_and_plan() {
        let engine = StoryEngine::builder().with_design(design()).build().unwrap();
        assert_eq!(
            engine.memory_for(&NodeId::from("A")).unwrap(),
            "[root] Arrival"
        );
        let plan = engine.generation_plan().unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].node, NodeId::from("root"));
    }

    #[test]
    fn parse_anomalies_are_kept() {
        let engine = StoryEngine::builder()
            .with_design(design())
            .with_script_text("stray\n=== Node: root ===\n")
            .build()
            .unwrap();
        assert_eq!(engine.parse_anomalies().len(), 1);
    }
}
