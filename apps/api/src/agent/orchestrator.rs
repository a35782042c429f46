use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;
use tracing::info;

use crate::agent::flow::AnswerFlow;
use crate::agent::tools::RetrievalTool;
use crate::agent::QaError;
use crate::llm_client::LanguageModel;
use crate::retry::RetryPolicy;

/// Question → answer. One entry per distinct question.
pub type Answers = BTreeMap<String, String>;

/// `questions` as sent by clients: one newline-separated string or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum QuestionsInput {
    Text(String),
    List(Vec<String>),
}

impl QuestionsInput {
    pub fn into_text(self) -> String {
        match self {
            QuestionsInput::Text(text) => text,
            QuestionsInput::List(list) => list.join("\n"),
        }
    }
}

/// Splits on newlines, trims, drops blanks and repeats. Order is kept.
pub fn split_questions(text: &str) -> Vec<String> {
    let mut questions: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !questions.iter().any(|q| q == line) {
            questions.push(line.to_string());
        }
    }
    questions
}

pub struct QuestionAnswerer {
    model: Arc<dyn LanguageModel>,
    tool: Arc<dyn RetrievalTool>,
    policy: RetryPolicy,
}

impl QuestionAnswerer {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tool: Arc<dyn RetrievalTool>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            model,
            tool,
            policy,
        }
    }

    pub fn tool_name(&self) -> String {
        self.tool.spec().name
    }

    /// Answers every question in `questions` for `user_id`.
    ///
    /// The batch is retried as a whole under the configured policy, and the
    /// deadline covers every attempt. Blank input is rejected before any
    /// model or retrieval call.
    pub async fn answer(&self, user_id: &str, questions: &str) -> Result<Answers, QaError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(QaError::Validation("User ID cannot be empty.".to_string()));
        }
        let questions = split_questions(questions);
        if questions.is_empty() {
            return Err(QaError::Validation("Questions cannot be empty.".to_string()));
        }

        info!(
            "Answering {} questions for {} via {}",
            questions.len(),
            user_id,
            self.tool_name()
        );
        let answers = self
            .policy
            .run(|_| self.answer_all(user_id, &questions))
            .await?;
        Ok(answers)
    }

    async fn answer_all(&self, user_id: &str, questions: &[String]) -> Result<Answers, QaError> {
        let results = join_all(questions.iter().map(|question| async move {
            let answer = AnswerFlow::new(self.model.as_ref(), self.tool.as_ref(), user_id, question)
                .run()
                .await?;
            Ok::<_, QaError>((question.clone(), answer))
        }))
        .await;

        results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::agent::fakes::{FakeModel, FakeTool};
    use crate::llm_client::{LlmError, ModelTurn};

    fn answerer(model: FakeModel, tool: FakeTool) -> (QuestionAnswerer, Arc<FakeModel>, Arc<FakeTool>) {
        let model = Arc::new(model);
        let tool = Arc::new(tool);
        let answerer = QuestionAnswerer::new(model.clone(), tool.clone(), RetryPolicy::default());
        (answerer, model, tool)
    }

    #[test]
    fn test_split_questions() {
        assert_eq!(
            split_questions("  What skills?\n\n\tWhat education?  \nWhat skills?\n"),
            vec!["What skills?".to_string(), "What education?".to_string()]
        );
        assert!(split_questions(" \n\t\n").is_empty());
    }

    #[test]
    fn test_questions_input_accepts_string_or_list() {
        let text: QuestionsInput = serde_json::from_value(json!("a\nb")).unwrap();
        let list: QuestionsInput = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(text.into_text(), "a\nb");
        assert_eq!(list.into_text(), "a\nb");
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_questions_give_two_answers() {
        let (answerer, _, tool) = answerer(
            FakeModel::tool_then_echo("query_resume"),
            FakeTool::new("query_resume", r#"[{"skills":"Python"}]"#),
        );

        let answers = answerer
            .answer("user_12345", "What skills does the user have?\nWhat is their education?")
            .await
            .unwrap();

        assert_eq!(answers.len(), 2);
        assert!(answers.contains_key("What skills does the user have?"));
        assert!(answers.contains_key("What is their education?"));
        assert!(answers.values().all(|a| !a.is_empty()));
        assert_eq!(tool.invocation_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_input_makes_no_external_calls() {
        let (answerer, model, tool) = answerer(
            FakeModel::tool_then_echo("query_resume"),
            FakeTool::new("query_resume", "[]"),
        );

        let blank_questions = answerer.answer("user_12345", "  \n\t ").await;
        let blank_user = answerer.answer("   ", "What skills?").await;

        assert!(matches!(blank_questions, Err(QaError::Validation(_))));
        assert!(matches!(blank_user, Err(QaError::Validation(_))));
        assert_eq!(model.call_count(), 0);
        assert_eq!(tool.invocation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_questions_run_concurrently() {
        let (answerer, _, _) = answerer(
            FakeModel::new(|_, _| Ok(ModelTurn::text("ok"))).with_delay(Duration::from_secs(5)),
            FakeTool::new("query_resume", "[]"),
        );

        let started = Instant::now();
        let answers = answerer.answer("user_12345", "a\nb\nc\nd").await.unwrap();

        assert_eq!(answers.len(), 4);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrieval_failing_every_attempt_is_exhausted_after_three() {
        let (answerer, _, tool) = answerer(
            FakeModel::tool_then_echo("query_resume"),
            FakeTool::new("query_resume", "[]").failing(usize::MAX),
        );

        let started = Instant::now();
        let result = answerer.answer("user_12345", "What skills?").await;

        assert!(matches!(result, Err(QaError::Exhausted { attempts: 3, .. })));
        assert_eq!(tool.invocation_count(), 3);
        // Two backoff sleeps: 1s then 2s.
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_success() {
        let (answerer, _, tool) = answerer(
            FakeModel::tool_then_echo("query_resume"),
            FakeTool::new("query_resume", "Python").failing(1),
        );

        let answers = answerer.answer("user_12345", "What skills?").await.unwrap();

        assert_eq!(answers["What skills?"], "Based on: Python");
        assert_eq!(tool.invocation_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_model_times_out() {
        let (answerer, _, _) = answerer(
            FakeModel::new(|_, _| Ok(ModelTurn::text("too late"))).with_delay(Duration::from_secs(60)),
            FakeTool::new("query_resume", "[]"),
        );

        let result = answerer.answer("user_12345", "What skills?").await;

        assert!(matches!(result, Err(QaError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_credentials_fail_fast() {
        let (answerer, model, _) = answerer(
            FakeModel::new(|_, _| {
                Err(LlmError::Api {
                    status: 401,
                    message: "invalid api key".to_string(),
                })
            }),
            FakeTool::new("query_resume", "[]"),
        );

        let result = answerer.answer("user_12345", "What skills?").await;

        assert!(matches!(result, Err(QaError::Model(LlmError::Api { status: 401, .. }))));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrieval_is_scoped_to_request_user() {
        let (answerer, _, tool) = answerer(
            FakeModel::new(|_, tools_offered| {
                if tools_offered {
                    Ok(ModelTurn::tool_call("query_resume", json!({ "user_id": "admin" })))
                } else {
                    Ok(ModelTurn::text("answer"))
                }
            }),
            FakeTool::new("query_resume", "[]"),
        );

        answerer.answer("user_12345", "a\nb").await.unwrap();

        let invocations = tool.invocations.lock().unwrap();
        assert_eq!(invocations.len(), 2);
        assert!(invocations.iter().all(|(user, _)| user == "user_12345"));
    }
}
