//! Script DSL parser.
//!
//! A script document is plain text partitioned into nodes:
//!
//! ```text
//! === Node: root ===
//! <scene>Classroom</scene>
//! <image id="Mio">smile</image>
//! <content id="narrator">The bell rings.</content>
//! <content id="Mio">Did you hear that?</content>
//! [IF: Mio >= 3]
//! <content id="Mio">Let's go together.</content>
//! [ELSE]
//! <content id="Mio">I'll go alone.</content>
//! [ENDIF]
//! [CHOICE]
//! 1. Follow her -> node1
//! 2. Stay behind -> node2
//! ```
//!
//! Each trimmed, non-blank line is matched against [`LineRule::PRECEDENCE`];
//! the first rule that matches decides the instruction. Lines that match
//! nothing are dropped and reported as [`ContentAnomaly::UnrecognizedLine`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::core::anomaly::ContentAnomaly;
use crate::core::config::ScriptConfig;
use crate::schema::instruction::ScriptInstruction;
use crate::schema::node::NodeId;

static NODE_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^===\s*Node:\s*(.+?)\s*===").expect("valid regex"));
static END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^===\s*End\b").expect("valid regex"));

static SCENE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<scene>\s*(.+?)\s*</scene>$").expect("valid regex"));
static LEGACY_SCENE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[SCENE:\s*(.+?)\s*\]$").expect("valid regex"));

static IF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\[IF:\s*(.+?)\s*>=\s*(-?\d+)\s*\]$").expect("valid regex")
});
static ELSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[ELSE\]$").expect("valid regex"));
static ENDIF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[END\s*IF\]$").expect("valid regex"));

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<image\s+id="([^"]*)">\s*([^<]*?)\s*</image>$"#).expect("valid regex")
});
static LEGACY_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[IMAGE:\s*(.*?)\s*\]$").expect("valid regex"));

static CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<content\s+id="([^"]+)">(.+?)</content>$"#).expect("valid regex")
});

static JUMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[JUMP:\s*(.+?)\s*\]$").expect("valid regex"));

static CHOICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[CHOICE\]$").expect("valid regex"));
static TAGGED_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<choice(?:\s+target="([^"]*)")?\s*>(.+?)</choice>$"#).expect("valid regex")
});
static NUMBERED_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*[.)、．]\s*(.+?)(?:\s*(?:->|→)\s*(\S+))?$").expect("valid regex")
});

static LEGACY_DIALOGUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:：]+?)\s*[:：]\s*(.+)$").expect("valid regex"));

/// One line matcher. The order of [`LineRule::PRECEDENCE`] is the order
/// rules are tried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineRule {
    /// `<scene>name</scene>`, `[SCENE: name]`
    Scene,
    /// `[IF: role >= level]`, `[ELSE]`, `[ENDIF]`
    Conditional,
    /// `<image id="speaker">expression</image>`, `[IMAGE: speaker-expression]`
    Image,
    /// `<content id="speaker">text</content>`
    Content,
    /// `[JUMP: node]`
    Jump,
    /// `[CHOICE]` and `<choice target="node">text</choice>`
    Choice,
    /// `speaker: text`
    LegacyDialogue,
}

impl LineRule {
    /// First match wins.
    pub const PRECEDENCE: [LineRule; 7] = [
        LineRule::Scene,
        LineRule::Conditional,
        LineRule::Image,
        LineRule::Content,
        LineRule::Jump,
        LineRule::Choice,
        LineRule::LegacyDialogue,
    ];

    /// Try this rule on a trimmed line. `next_option` is the index given to
    /// an unnumbered choice option.
    pub fn try_match(
        self,
        line: &str,
        config: &ScriptConfig,
        next_option: usize,
    ) -> Option<ScriptInstruction> {
        match self {
            LineRule::Scene => SCENE_RE
                .captures(line)
                .or_else(|| LEGACY_SCENE_RE.captures(line))
                .map(|caps| ScriptInstruction::Scene(caps[1].to_string())),

            LineRule::Conditional => {
                if let Some(caps) = IF_RE.captures(line) {
                    let level = caps[2].parse::<i32>().ok()?;
                    Some(ScriptInstruction::ConditionIf {
                        role: caps[1].to_string(),
                        level,
                    })
                } else if ELSE_RE.is_match(line) {
                    Some(ScriptInstruction::ConditionElse)
                } else if ENDIF_RE.is_match(line) {
                    Some(ScriptInstruction::ConditionEndIf)
                } else {
                    None
                }
            }

            LineRule::Image => {
                if let Some(caps) = IMAGE_RE.captures(line) {
                    let speaker = caps[1].trim();
                    let expression = caps[2].trim();
                    Some(image_instruction(speaker, expression, config))
                } else if let Some(caps) = LEGACY_IMAGE_RE.captures(line) {
                    let value = caps[1].trim();
                    let (speaker, expression) = match value.split_once('-') {
                        Some((speaker, expression)) => (speaker.trim(), expression.trim()),
                        None if value.is_empty() => ("", ""),
                        None => (value, "neutral"),
                    };
                    if speaker.is_empty() {
                        return Some(ScriptInstruction::ImageClear);
                    }
                    Some(image_instruction(speaker, expression, config))
                } else {
                    None
                }
            }

            LineRule::Content => {
                let caps = CONTENT_RE.captures(line)?;
                let speaker = caps[1].trim();
                let text = caps[2].trim();
                if speaker.is_empty() || text.is_empty() {
                    return None;
                }
                Some(line_instruction(speaker, text, config))
            }

            LineRule::Jump => JUMP_RE
                .captures(line)
                .map(|caps| ScriptInstruction::Jump(NodeId::new(&caps[1]))),

            LineRule::Choice => {
                if CHOICE_RE.is_match(line) {
                    Some(ScriptInstruction::ChoiceStart)
                } else {
                    tagged_option(line, next_option)
                }
            }

            LineRule::LegacyDialogue => {
                let caps = LEGACY_DIALOGUE_RE.captures(line)?;
                let speaker = caps[1].trim();
                if !plausible_speaker(speaker, config) {
                    return None;
                }
                let text = strip_quotes(caps[2].trim());
                if text.is_empty() {
                    return None;
                }
                Some(line_instruction(speaker, text, config))
            }
        }
    }
}

fn image_instruction(speaker: &str, expression: &str, config: &ScriptConfig) -> ScriptInstruction {
    if config.is_clear_token(expression) {
        ScriptInstruction::ImageClear
    } else {
        ScriptInstruction::Image {
            speaker: speaker.to_string(),
            expression: expression.to_string(),
        }
    }
}

fn line_instruction(speaker: &str, text: &str, config: &ScriptConfig) -> ScriptInstruction {
    if config.is_narrator(speaker) {
        ScriptInstruction::Narration(text.to_string())
    } else {
        ScriptInstruction::Dialogue {
            speaker: speaker.to_string(),
            text: text.to_string(),
        }
    }
}

fn tagged_option(line: &str, index: usize) -> Option<ScriptInstruction> {
    let caps = TAGGED_OPTION_RE.captures(line)?;
    let target = caps
        .get(1)
        .map(|m| m.as_str().trim())
        .filter(|t| !t.is_empty())
        .map(NodeId::new);
    Some(ScriptInstruction::ChoiceOption {
        index,
        text: caps[2].trim().to_string(),
        target,
    })
}

fn numbered_option(line: &str) -> Option<ScriptInstruction> {
    let caps = NUMBERED_OPTION_RE.captures(line)?;
    let index = caps[1].parse::<usize>().ok()?;
    Some(ScriptInstruction::ChoiceOption {
        index,
        text: caps[2].trim().to_string(),
        target: caps.get(3).map(|m| NodeId::new(m.as_str())),
    })
}

/// A legacy speaker must be short and must not look like markup, a heading,
/// or a numbered option.
fn plausible_speaker(speaker: &str, config: &ScriptConfig) -> bool {
    let Some(first) = speaker.chars().next() else {
        return false;
    };
    if matches!(first, '[' | '<' | '#' | '=' | '*' | '-') || first.is_ascii_digit() {
        return false;
    }
    if speaker.contains("->") || speaker.contains("http") {
        return false;
    }
    speaker.chars().count() <= config.max_legacy_speaker_chars
}

fn strip_quotes(text: &str) -> &str {
    for (open, close) in [('"', '"'), ('“', '”'), ('「', '」'), ('『', '』')] {
        if let Some(inner) = text
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim();
        }
    }
    text
}

/// Parsed instruction streams, one per node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryScript {
    nodes: BTreeMap<NodeId, Vec<ScriptInstruction>>,
}

impl StoryScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &NodeId) -> Option<&[ScriptInstruction]> {
        self.nodes.get(id).map(|v| v.as_slice())
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Swap in a whole new instruction list for `id`, returning the old one.
    pub fn replace_node(
        &mut self,
        id: NodeId,
        instructions: Vec<ScriptInstruction>,
    ) -> Option<Vec<ScriptInstruction>> {
        self.nodes.insert(id, instructions)
    }

    pub fn remove_node(&mut self, id: &NodeId) -> Option<Vec<ScriptInstruction>> {
        self.nodes.remove(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &[ScriptInstruction])> {
        self.nodes.iter().map(|(id, list)| (id, list.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Result of [`ScriptParser::parse_with_report`].
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub script: StoryScript,
    pub anomalies: Vec<ContentAnomaly>,
}

/// Turns script text into a [`StoryScript`]. Pure: no I/O, never fails.
#[derive(Debug, Clone, Default)]
pub struct ScriptParser {
    config: ScriptConfig,
}

impl ScriptParser {
    pub fn new(config: ScriptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Parse a full document, logging every anomaly.
    pub fn parse(&self, text: &str) -> StoryScript {
        let report = self.parse_with_report(text);
        for anomaly in &report.anomalies {
            anomaly.log();
        }
        report.script
    }

    /// Parse a full document and return the anomalies instead of logging them.
    pub fn parse_with_report(&self, text: &str) -> ParseReport {
        let mut anomalies = Vec::new();
        let mut sections: Vec<(NodeId, Vec<(usize, &str)>)> = Vec::new();

        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || END_RE.is_match(line) {
                continue;
            }
            if let Some(caps) = NODE_HEADER_RE.captures(line) {
                sections.push((NodeId::new(caps[1].trim()), Vec::new()));
                continue;
            }
            match sections.last_mut() {
                Some((_, lines)) => lines.push((i + 1, line)),
                None => anomalies.push(ContentAnomaly::LineOutsideNode {
                    line_no: i + 1,
                    line: line.to_string(),
                }),
            }
        }

        let mut script = StoryScript::new();
        for (node, lines) in sections {
            if script.contains(&node) {
                anomalies.push(ContentAnomaly::DuplicateNode(node.clone()));
            }
            let instructions = self.parse_lines(&node, &lines, &mut anomalies);
            debug!(node = %node, instructions = instructions.len(), "parsed node");
            script.replace_node(node, instructions);
        }

        ParseReport { script, anomalies }
    }

    /// Parse the body of a single node. Header and end markers in `body` are
    /// skipped, so regenerated text can be passed in as produced.
    pub fn parse_node_body(
        &self,
        node: &NodeId,
        body: &str,
    ) -> (Vec<ScriptInstruction>, Vec<ContentAnomaly>) {
        let mut anomalies = Vec::new();
        let mut lines = Vec::new();
        for (i, raw) in body.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || END_RE.is_match(line) {
                continue;
            }
            if let Some(caps) = NODE_HEADER_RE.captures(line) {
                if caps[1].trim() != node.as_str() {
                    anomalies.push(ContentAnomaly::UnrecognizedLine {
                        node: node.clone(),
                        line_no: i + 1,
                        line: line.to_string(),
                    });
                }
                continue;
            }
            lines.push((i + 1, line));
        }
        let instructions = self.parse_lines(node, &lines, &mut anomalies);
        (instructions, anomalies)
    }

    fn parse_lines(
        &self,
        node: &NodeId,
        lines: &[(usize, &str)],
        anomalies: &mut Vec<ContentAnomaly>,
    ) -> Vec<ScriptInstruction> {
        let mut out = Vec::new();
        // options in the current contiguous run
        let mut run = 0usize;
        let mut in_block = false;

        for &(line_no, line) in lines {
            if in_block {
                if let Some(option) = numbered_option(line).or_else(|| tagged_option(line, run + 1)) {
                    run += 1;
                    out.push(option);
                    continue;
                }
                in_block = false;
            }

            match self.match_line(line, run + 1) {
                Some(instruction) => {
                    match instruction {
                        ScriptInstruction::ChoiceStart => {
                            in_block = true;
                            run = 0;
                        }
                        ScriptInstruction::ChoiceOption { .. } => run += 1,
                        _ => run = 0,
                    }
                    out.push(instruction);
                }
                None => anomalies.push(ContentAnomaly::UnrecognizedLine {
                    node: node.clone(),
                    line_no,
                    line: line.to_string(),
                }),
            }
        }

        balance_conditionals(node, out, anomalies)
    }

    fn match_line(&self, line: &str, next_option: usize) -> Option<ScriptInstruction> {
        LineRule::PRECEDENCE
            .iter()
            .find_map(|rule| rule.try_match(line, &self.config, next_option))
    }
}

/// Make every `If` have at most one `Else` and exactly one `EndIf`.
///
/// Stray `Else`/`EndIf` markers are dropped; open `If`s are closed at the
/// end of the node.
fn balance_conditionals(
    node: &NodeId,
    instructions: Vec<ScriptInstruction>,
    anomalies: &mut Vec<ContentAnomaly>,
) -> Vec<ScriptInstruction> {
    // one entry per open If: whether its Else has been seen
    let mut open: Vec<bool> = Vec::new();
    let mut out = Vec::with_capacity(instructions.len());
    let mut unbalanced = |detail: &str| {
        anomalies.push(ContentAnomaly::UnbalancedConditional {
            node: node.clone(),
            detail: detail.to_string(),
        })
    };

    for instruction in instructions {
        match instruction {
            ScriptInstruction::ConditionIf { .. } => {
                open.push(false);
                out.push(instruction);
            }
            ScriptInstruction::ConditionElse => match open.last_mut() {
                Some(seen_else) if !*seen_else => {
                    *seen_else = true;
                    out.push(instruction);
                }
                Some(_) => unbalanced("dropped a second [ELSE] for the same [IF]"),
                None => unbalanced("dropped an [ELSE] without an open [IF]"),
            },
            ScriptInstruction::ConditionEndIf => {
                if open.pop().is_some() {
                    out.push(instruction);
                } else {
                    unbalanced("dropped an [ENDIF] without an open [IF]");
                }
            }
            other => out.push(other),
        }
    }

    for _ in open.drain(..) {
        unbalanced("closed an unterminated [IF] at the end of the node");
        out.push(ScriptInstruction::ConditionEndIf);
    }
    out
}
