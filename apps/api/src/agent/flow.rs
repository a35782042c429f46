//! Per-question answer state machine.
//!
//! ```text
//! Idle ──ask(with tool)──▶ ToolDecision ──no tool call──────────────▶ Answered
//!                               │
//!                               └─tool call─▶ ToolExecuted ─ask(no tools)─▶ Answered
//! ```
//!
//! The tool is offered exactly once, on the first turn, and only the first
//! tool call of that turn is executed. The final turn offers no tools, so a
//! run always ends within three steps.

use serde_json::Value;
use tracing::{debug, warn};

use crate::agent::prompts::{ANSWER_SYSTEM, FINAL_ANSWER_PROMPT, QUESTION_PROMPT};
use crate::agent::tools::RetrievalTool;
use crate::agent::QaError;
use crate::llm_client::prompts::GROUNDING_INSTRUCTION;
use crate::llm_client::{ChatMessage, LanguageModel, LlmError, ModelTurn, ToolCall};

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerState {
    Idle,
    ToolDecision(ModelTurn),
    ToolExecuted { tool: String, output: String },
    Answered(String),
}

impl AnswerState {
    fn name(&self) -> &'static str {
        match self {
            AnswerState::Idle => "Idle",
            AnswerState::ToolDecision(_) => "ToolDecision",
            AnswerState::ToolExecuted { .. } => "ToolExecuted",
            AnswerState::Answered(_) => "Answered",
        }
    }
}

pub struct AnswerFlow<'a> {
    model: &'a dyn LanguageModel,
    tool: &'a dyn RetrievalTool,
    user_id: &'a str,
    question: &'a str,
}

impl<'a> AnswerFlow<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        tool: &'a dyn RetrievalTool,
        user_id: &'a str,
        question: &'a str,
    ) -> Self {
        Self {
            model,
            tool,
            user_id,
            question,
        }
    }

    /// Drives the machine from `Idle` to `Answered`.
    pub async fn run(&self) -> Result<String, QaError> {
        let mut state = AnswerState::Idle;
        loop {
            if let AnswerState::Answered(answer) = state {
                return Ok(answer);
            }
            let next = self.step(state).await?;
            debug!("question {:?}: -> {}", self.question, next.name());
            state = next;
        }
    }

    /// Performs one transition.
    pub async fn step(&self, state: AnswerState) -> Result<AnswerState, QaError> {
        match state {
            AnswerState::Idle => {
                let spec = self.tool.spec();
                let prompt = fill_template(
                    QUESTION_PROMPT,
                    &[
                        ("user_id", self.user_id),
                        ("question", self.question),
                        ("tool_name", spec.name.as_str()),
                        ("tool_description", spec.description.as_str()),
                    ],
                );
                let turn = self
                    .model
                    .chat(&[ChatMessage::system(ANSWER_SYSTEM), ChatMessage::user(prompt)], &[spec])
                    .await?;
                Ok(AnswerState::ToolDecision(turn))
            }
            AnswerState::ToolDecision(turn) => self.decide(turn).await,
            AnswerState::ToolExecuted { output, .. } => {
                let prompt = fill_template(
                    FINAL_ANSWER_PROMPT,
                    &[
                        ("tool_output", output.as_str()),
                        ("grounding_instruction", GROUNDING_INSTRUCTION),
                        ("question", self.question),
                    ],
                );
                let turn = self
                    .model
                    .chat(&[ChatMessage::system(ANSWER_SYSTEM), ChatMessage::user(prompt)], &[])
                    .await?;
                Ok(AnswerState::Answered(text_of(turn)?))
            }
            answered @ AnswerState::Answered(_) => Ok(answered),
        }
    }

    async fn decide(&self, turn: ModelTurn) -> Result<AnswerState, QaError> {
        let mut calls = turn.tool_calls.into_iter();
        let Some(call) = calls.next() else {
            let content = turn.content.ok_or(LlmError::EmptyContent)?;
            return Ok(AnswerState::Answered(content));
        };
        let ignored = calls.count();
        if ignored > 0 {
            warn!("Model requested {} extra tool calls; only the first is run", ignored);
        }

        let ToolCall {
            id,
            name,
            arguments,
        } = call;
        let expected = self.tool.spec().name;
        if name != expected {
            return Err(QaError::MalformedToolCall(format!(
                "unknown tool '{name}' (available: '{expected}')"
            )));
        }

        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments
        };
        debug!("Running tool call {id} ({name}) for {}", self.user_id);
        let output = self.tool.invoke(self.user_id, &arguments).await?;
        Ok(AnswerState::ToolExecuted { tool: name, output })
    }
}

fn text_of(turn: ModelTurn) -> Result<String, QaError> {
    Ok(turn.content.ok_or(LlmError::EmptyContent)?)
}

/// Substitutes `{name}` placeholders in a single left-to-right pass.
/// Inserted values are never rescanned, so braces in resume text or
/// questions come through verbatim.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        filled.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values.iter().find_map(|(name, value)| {
            let after = tail.strip_prefix(name)?.strip_prefix('}')?;
            Some((*value, after))
        });
        match hit {
            Some((value, after)) => {
                filled.push_str(value);
                rest = after;
            }
            None => {
                filled.push('{');
                rest = tail;
            }
        }
    }
    filled.push_str(rest);
    filled
}
