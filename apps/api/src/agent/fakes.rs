//! Scripted stand-ins for the model and the retrieval backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::tools::{RetrievalError, RetrievalTool};
use crate::llm_client::{ChatMessage, LanguageModel, LlmError, ModelTurn, ToolSpec};

type Responder = dyn Fn(&str, bool) -> Result<ModelTurn, LlmError> + Send + Sync;

/// Answers with `respond(prompt, tools_offered)` after `delay`.
pub struct FakeModel {
    respond: Box<Responder>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl FakeModel {
    pub fn new(
        respond: impl Fn(&str, bool) -> Result<ModelTurn, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Calls the tool on the first turn, then echoes what it retrieved.
    pub fn tool_then_echo(tool: &'static str) -> Self {
        Self::new(move |prompt, tools_offered| {
            if tools_offered {
                Ok(ModelTurn::tool_call(tool, json!({})))
            } else {
                Ok(ModelTurn::text(format!("Based on: {}", last_line_with(prompt, "Retrieved"))))
            }
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn last_line_with<'a>(prompt: &'a str, marker: &str) -> &'a str {
    prompt
        .lines()
        .skip_while(|l| !l.contains(marker))
        .nth(1)
        .unwrap_or(prompt)
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelTurn, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        (self.respond)(prompt, !tools.is_empty())
    }
}

/// Records every invocation; fails while `failures_left` is positive.
pub struct FakeTool {
    pub name: &'static str,
    pub output: String,
    failures_left: AtomicUsize,
    pub invocations: Mutex<Vec<(String, Value)>>,
}

impl FakeTool {
    pub fn new(name: &'static str, output: &str) -> Self {
        Self {
            name,
            output: output.to_string(),
            failures_left: AtomicUsize::new(0),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, times: usize) -> Self {
        self.failures_left = AtomicUsize::new(times);
        self
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }
}

#[async_trait]
impl RetrievalTool for FakeTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.to_string(),
            description: "test tool".to_string(),
            parameters: json!({ "type": "object" }),
        }
    }

    async fn invoke(&self, user_id: &str, arguments: &Value) -> Result<String, RetrievalError> {
        self.invocations
            .lock()
            .unwrap()
            .push((user_id.to_string(), arguments.clone()));
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(RetrievalError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.output.clone())
    }
}
