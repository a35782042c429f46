// Resume question answering.
// Each question runs through a small fixed-depth state machine (flow.rs):
// ask the model, optionally run one retrieval tool, get the final answer.
// All questions in a batch run concurrently under one RetryPolicy.

pub mod flow;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
pub mod tools;

#[cfg(test)]
pub(crate) mod fakes;

use std::time::Duration;

use thiserror::Error;

use crate::agent::tools::RetrievalError;
use crate::llm_client::LlmError;
use crate::retry::{RetryError, Retryable};

#[derive(Debug, Error)]
pub enum QaError {
    #[error("{0}")]
    Validation(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Language model failed: {0}")]
    Model(#[from] LlmError),

    #[error("Malformed tool call: {0}")]
    MalformedToolCall(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<QaError> },
}

impl Retryable for QaError {
    fn is_retryable(&self) -> bool {
        match self {
            QaError::Retrieval(_) | QaError::MalformedToolCall(_) => true,
            QaError::Model(e) => e.is_transient(),
            QaError::Validation(_) | QaError::Timeout(_) | QaError::Exhausted { .. } => false,
        }
    }
}

impl From<RetryError<QaError>> for QaError {
    fn from(e: RetryError<QaError>) -> Self {
        match e {
            RetryError::TimedOut(after) => QaError::Timeout(after),
            RetryError::Exhausted { attempts, last } => QaError::Exhausted {
                attempts,
                last: Box::new(last),
            },
            RetryError::Aborted(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_not_retried() {
        assert!(!QaError::Validation("Questions cannot be empty.".into()).is_retryable());
    }

    #[test]
    fn test_retrieval_and_tool_errors_are_retried() {
        assert!(QaError::Retrieval(RetrievalError::InvalidArguments("x".into())).is_retryable());
        assert!(QaError::MalformedToolCall("unknown tool".into()).is_retryable());
    }

    #[test]
    fn test_model_errors_follow_transience() {
        let transient = QaError::Model(LlmError::Api {
            status: 503,
            message: "overloaded".into(),
        });
        let permanent = QaError::Model(LlmError::Api {
            status: 401,
            message: "bad key".into(),
        });
        assert!(transient.is_retryable());
        assert!(!permanent.is_retryable());
    }

    #[test]
    fn test_exhausted_message_carries_last_error() {
        let err = QaError::from(RetryError::Exhausted {
            attempts: 3,
            last: QaError::MalformedToolCall("unknown tool 'drop_table'".into()),
        });
        assert_eq!(
            err.to_string(),
            "Failed after 3 attempts: Malformed tool call: unknown tool 'drop_table'"
        );
    }
}
