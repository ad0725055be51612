//! Playback interpreter.
//!
//! Walks the instruction stream of the session's current node one
//! instruction at a time. It suspends in exactly two places: after a line
//! is displayed (until [`Interpreter::advance`]) and when a menu is shown
//! (until [`Interpreter::choose`]). Conditionals are resolved by a linear,
//! depth-counting scan over the flat instruction list.

use thiserror::Error;
use tracing::{debug, trace};

use crate::core::anomaly::ContentAnomaly;
use crate::core::graph::{StoryGraph, StructuralError};
use crate::core::progression::ProgressionLookup;
use crate::core::script::StoryScript;
use crate::core::session::{
    ChoiceMenu, ChoiceRecord, ConditionBranch, ConditionFrame, MenuOption, PlaybackSession,
    PlaybackState, Portrait,
};
use crate::schema::instruction::ScriptInstruction;
use crate::schema::node::NodeId;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("structural error: {0}")]
    Structural(#[from] StructuralError),
    #[error("not awaiting a choice (state: {0:?})")]
    NotAwaitingChoice(PlaybackState),
    #[error("choice {index} is out of range ({available} options)")]
    ChoiceOutOfRange { index: usize, available: usize },
    #[error("jumped {jumps} times without showing anything, last at node {node}")]
    RunawayJumps { node: NodeId, jumps: usize },
}

/// Callbacks fired while playing. Every method defaults to a no-op.
pub trait PlaybackObserver {
    fn on_scene_change(&mut self, _background: &str) {}
    /// `None` when the portrait is cleared.
    fn on_portrait_change(&mut self, _portrait: Option<&Portrait>) {}
    /// `speaker` is `None` for narration.
    fn on_line(&mut self, _speaker: Option<&str>, _text: &str) {}
    fn on_choices(&mut self, _options: &[String]) {}
    fn on_node_finished(&mut self, _node: &NodeId) {}
    fn on_anomaly(&mut self, _anomaly: &ContentAnomaly) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl PlaybackObserver for NullObserver {}

/// Where a failed `If` resumes.
enum Landing {
    Else(usize),
    EndIf(usize),
}

/// Executes scripts against sessions. Borrows the graph, script and
/// progression; all mutable state lives in the session.
pub struct Interpreter<'a> {
    graph: &'a StoryGraph,
    script: &'a StoryScript,
    progression: &'a dyn ProgressionLookup,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        graph: &'a StoryGraph,
        script: &'a StoryScript,
        progression: &'a dyn ProgressionLookup,
    ) -> Self {
        Self {
            graph,
            script,
            progression,
        }
    }

    /// Run until the next suspension point and return the resulting state.
    ///
    /// Does nothing unless the session is running and not waiting on a line.
    pub fn step(
        &self,
        session: &mut PlaybackSession,
        observer: &mut dyn PlaybackObserver,
    ) -> Result<PlaybackState, PlaybackError> {
        if session.state != PlaybackState::Running || session.awaiting_advance {
            return Ok(session.state);
        }
        if !self.graph.contains(&session.current_node) {
            return Err(StructuralError::UnknownNode(session.current_node.clone()).into());
        }

        let mut jumps = 0usize;
        loop {
            let Some(instructions) = self.script.get(&session.current_node) else {
                report(observer, ContentAnomaly::EmptyNode(session.current_node.clone()));
                return Ok(self.finish(session, observer));
            };
            let ip = session.instruction_pointer;
            let Some(instruction) = instructions.get(ip) else {
                return Ok(self.finish(session, observer));
            };
            trace!(node = %session.current_node, ip, ?instruction, "step");

            match instruction {
                ScriptInstruction::Scene(name) => {
                    session.displayed.background = Some(name.clone());
                    observer.on_scene_change(name);
                    session.instruction_pointer += 1;
                }
                ScriptInstruction::Image {
                    speaker,
                    expression,
                } => {
                    session.displayed.image = Some(Portrait {
                        speaker: speaker.clone(),
                        expression: expression.clone(),
                    });
                    observer.on_portrait_change(session.displayed.image.as_ref());
                    session.instruction_pointer += 1;
                }
                ScriptInstruction::ImageClear => {
                    session.displayed.image = None;
                    observer.on_portrait_change(None);
                    session.instruction_pointer += 1;
                }
                ScriptInstruction::Narration(text) => {
                    session.displayed.speaker = None;
                    session.displayed.text = Some(text.clone());
                    session.awaiting_advance = true;
                    observer.on_line(None, text);
                    return Ok(PlaybackState::Running);
                }
                ScriptInstruction::Dialogue { speaker, text } => {
                    session.displayed.speaker = Some(speaker.clone());
                    session.displayed.text = Some(text.clone());
                    session.awaiting_advance = true;
                    observer.on_line(Some(speaker), text);
                    return Ok(PlaybackState::Running);
                }
                ScriptInstruction::ConditionIf { role, level } => {
                    let actual = match self.progression.level(role) {
                        Some(value) => value,
                        None => {
                            if session.unknown_roles.insert(role.clone()) {
                                report(observer, ContentAnomaly::UnknownRole(role.clone()));
                            }
                            0
                        }
                    };
                    if actual >= *level {
                        session.condition_stack.push(ConditionFrame {
                            opened_at: ip,
                            branch: ConditionBranch::Then,
                        });
                        session.instruction_pointer += 1;
                    } else {
                        match skip_to_else_or_endif(instructions, ip + 1) {
                            Some(Landing::Else(at)) => {
                                session.condition_stack.push(ConditionFrame {
                                    opened_at: ip,
                                    branch: ConditionBranch::Else,
                                });
                                session.instruction_pointer = at + 1;
                            }
                            Some(Landing::EndIf(at)) => session.instruction_pointer = at + 1,
                            None => {
                                self.unbalanced(session, observer, "[IF] has no matching [ELSE] or [ENDIF]");
                                session.instruction_pointer = instructions.len();
                            }
                        }
                    }
                }
                ScriptInstruction::ConditionElse => {
                    // only reached by falling out of a taken Then body
                    match skip_to_endif(instructions, ip + 1) {
                        Some(at) => session.instruction_pointer = at + 1,
                        None => {
                            self.unbalanced(session, observer, "[ELSE] has no matching [ENDIF]");
                            session.instruction_pointer = instructions.len();
                        }
                    }
                    if session.condition_stack.pop().is_none() {
                        self.unbalanced(session, observer, "[ELSE] reached with no open [IF]");
                    }
                }
                ScriptInstruction::ConditionEndIf => {
                    if session.condition_stack.pop().is_none() {
                        self.unbalanced(session, observer, "[ENDIF] reached with no open [IF]");
                    }
                    session.instruction_pointer += 1;
                }
                ScriptInstruction::Jump(target) => {
                    jumps += 1;
                    if jumps > self.graph.len() {
                        return Err(PlaybackError::RunawayJumps {
                            node: target.clone(),
                            jumps,
                        });
                    }
                    self.enter(session, target)?;
                }
                ScriptInstruction::ChoiceStart | ScriptInstruction::ChoiceOption { .. } => {
                    let first = match instruction {
                        ScriptInstruction::ChoiceStart => ip + 1,
                        _ => ip,
                    };
                    let (options, resume_at) = collect_options(instructions, first);
                    if options.is_empty() {
                        report(
                            observer,
                            ContentAnomaly::EmptyChoiceBlock {
                                node: session.current_node.clone(),
                                at: ip,
                            },
                        );
                        session.instruction_pointer = resume_at;
                        continue;
                    }

                    let menu = ChoiceMenu { options, resume_at };
                    let texts = menu.texts();
                    session.menu = Some(menu);
                    session.state = PlaybackState::AwaitingChoice;
                    observer.on_choices(&texts);
                    return Ok(PlaybackState::AwaitingChoice);
                }
            }
        }
    }

    /// Move past the displayed line and keep stepping. Ignored unless a line
    /// is waiting.
    pub fn advance(
        &self,
        session: &mut PlaybackSession,
        observer: &mut dyn PlaybackObserver,
    ) -> Result<PlaybackState, PlaybackError> {
        if session.state != PlaybackState::Running || !session.awaiting_advance {
            return Ok(session.state);
        }
        session.awaiting_advance = false;
        session.instruction_pointer += 1;
        self.step(session, observer)
    }

    /// Resolve the menu with the option at `index` (0-based menu position).
    ///
    /// On error the session is left untouched and still awaiting a choice.
    pub fn choose(
        &self,
        session: &mut PlaybackSession,
        index: usize,
        observer: &mut dyn PlaybackObserver,
    ) -> Result<PlaybackState, PlaybackError> {
        let menu = match (&session.state, &session.menu) {
            (PlaybackState::AwaitingChoice, Some(menu)) => menu,
            _ => return Err(PlaybackError::NotAwaitingChoice(session.state)),
        };
        let option = menu
            .options
            .get(index)
            .cloned()
            .ok_or(PlaybackError::ChoiceOutOfRange {
                index,
                available: menu.options.len(),
            })?;
        let resume_at = menu.resume_at;

        if let Some(target) = &option.target {
            if !self.graph.contains(target) {
                return Err(StructuralError::UnknownNode(target.clone()).into());
            }
        }

        debug!(node = %session.current_node, choice = %option.text, "choice made");
        session.history.push(ChoiceRecord {
            node: session.current_node.clone(),
            text: option.text.clone(),
            target: option.target.clone(),
        });

        match option.target {
            Some(target) => session.enter_node(target),
            None => {
                session.menu = None;
                session.state = PlaybackState::Running;
                session.instruction_pointer = resume_at;
            }
        }
        self.step(session, observer)
    }

    fn enter(&self, session: &mut PlaybackSession, target: &NodeId) -> Result<(), PlaybackError> {
        if !self.graph.contains(target) {
            return Err(StructuralError::UnknownNode(target.clone()).into());
        }
        debug!(from = %session.current_node, to = %target, "jump");
        session.enter_node(target.clone());
        Ok(())
    }

    fn finish(&self, session: &mut PlaybackSession, observer: &mut dyn PlaybackObserver) -> PlaybackState {
        session.state = PlaybackState::Finished;
        session.menu = None;
        observer.on_node_finished(&session.current_node);
        PlaybackState::Finished
    }

    fn unbalanced(&self, session: &PlaybackSession, observer: &mut dyn PlaybackObserver, detail: &str) {
        report(
            observer,
            ContentAnomaly::UnbalancedConditional {
                node: session.current_node.clone(),
                detail: detail.to_string(),
            },
        );
    }
}

fn report(observer: &mut dyn PlaybackObserver, anomaly: ContentAnomaly) {
    anomaly.log();
    observer.on_anomaly(&anomaly);
}

/// Find the `Else` or `EndIf` that belongs to the `If` just before `from`.
/// Nested `If`s are skipped whole.
fn skip_to_else_or_endif(instructions: &[ScriptInstruction], from: usize) -> Option<Landing> {
    let mut depth = 0usize;
    for (i, instruction) in instructions.iter().enumerate().skip(from) {
        match instruction {
            ScriptInstruction::ConditionIf { .. } => depth += 1,
            ScriptInstruction::ConditionElse if depth == 0 => return Some(Landing::Else(i)),
            ScriptInstruction::ConditionEndIf if depth == 0 => return Some(Landing::EndIf(i)),
            ScriptInstruction::ConditionEndIf => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Find the `EndIf` closing the conditional whose `Else` is just before `from`.
fn skip_to_endif(instructions: &[ScriptInstruction], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, instruction) in instructions.iter().enumerate().skip(from) {
        match instruction {
            ScriptInstruction::ConditionIf { .. } => depth += 1,
            ScriptInstruction::ConditionEndIf if depth == 0 => return Some(i),
            ScriptInstruction::ConditionEndIf => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Collect the contiguous run of options starting at `from`. Returns the
/// options and the index just past the run.
fn collect_options(instructions: &[ScriptInstruction], from: usize) -> (Vec<MenuOption>, usize) {
    let mut options = Vec::new();
    let mut end = from;
    while let Some(ScriptInstruction::ChoiceOption { text, target, .. }) = instructions.get(end) {
        options.push(MenuOption {
            text: text.clone(),
            target: target.clone(),
        });
        end += 1;
    }
    (options, end)
}
