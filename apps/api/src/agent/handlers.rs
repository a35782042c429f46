//! Axum route handler for resume question answering.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::agent::orchestrator::{Answers, QuestionsInput};
use crate::agent::tools::resolve_user_id;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnswerQuestionRequest {
    pub user_id: String,
    pub questions: QuestionsInput,
}

#[derive(Debug, Serialize)]
pub struct AnswerQuestionResponse {
    pub success: bool,
    pub answers: Answers,
}

/// POST /api/agents/answer_question
///
/// Answers each newline-separated question about `user_id`'s resume.
/// `user_id` may be the user's UUID or username; it is resolved to the UUID
/// before either retrieval backend sees it. 400 on blank input, 504 when the deadline passes, 500 once retries are
/// exhausted.
pub async fn handle_answer_question(
    State(state): State<AppState>,
    Json(request): Json<AnswerQuestionRequest>,
) -> Result<Json<AnswerQuestionResponse>, AppError> {
    let questions = request.questions.into_text();
    let user_id = resolve_user_id(&state.db, &request.user_id).await?;
    let answers = state.answerer.answer(&user_id, &questions).await?;

    Ok(Json(AnswerQuestionResponse {
        success: true,
        answers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_newline_separated_questions() {
        let request: AnswerQuestionRequest = serde_json::from_str(
            r#"{"user_id": "user_12345", "questions": "What skills does the user have?\nWhat is their education?"}"#,
        )
        .unwrap();
        assert_eq!(request.user_id, "user_12345");
        assert_eq!(
            request.questions.into_text(),
            "What skills does the user have?\nWhat is their education?"
        );
    }

    #[test]
    fn test_response_shape() {
        let mut answers = Answers::new();
        answers.insert("What skills?".to_string(), "Python".to_string());
        let body = serde_json::to_value(AnswerQuestionResponse {
            success: true,
            answers,
        })
        .unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["answers"]["What skills?"], "Python");
    }
}
