//! Job-posting extraction: raw posting text → `ApplicationExtract`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::applications::prompts::{EXTRACT_PROMPT_TEMPLATE, EXTRACT_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::{LlmClient, LlmError};
use crate::retry::{RetryError, RetryPolicy};

/// Fields of a job posting needed to file an application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationExtract {
    pub job_role: String,
    pub job_description: String,
    pub company_name: String,
    pub company_description: Option<String>,
    pub final_date: Option<NaiveDate>,
}

/// What the model returns; every key may be null or missing.
#[derive(Debug, Default, Deserialize)]
struct RawExtract {
    job_role: Option<String>,
    job_description: Option<String>,
    company_name: Option<String>,
    company_description: Option<String>,
    final_date: Option<String>,
}

impl TryFrom<RawExtract> for ApplicationExtract {
    type Error = String;

    fn try_from(raw: RawExtract) -> Result<Self, Self::Error> {
        let missing: Vec<&str> = [
            ("job_role", &raw.job_role),
            ("job_description", &raw.job_description),
            ("company_name", &raw.company_name),
        ]
        .into_iter()
        .filter(|(_, value)| non_blank(value).is_none())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(format!(
                "Could not find {} in the posting",
                missing.join(", ")
            ));
        }

        Ok(Self {
            job_role: non_blank(&raw.job_role).unwrap_or_default(),
            job_description: non_blank(&raw.job_description).unwrap_or_default(),
            company_name: non_blank(&raw.company_name).unwrap_or_default(),
            company_description: non_blank(&raw.company_description),
            final_date: raw.final_date.as_deref().and_then(parse_final_date),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// An unparseable date is dropped rather than failing the whole extraction.
fn parse_final_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("Ignoring final_date '{raw}': {e}");
            None
        }
    }
}

/// Extracts application fields from `input_text`. Provider failures are
/// retried under `policy`; a posting missing a required field is a 422.
pub async fn extract_application_fields(
    input_text: &str,
    llm: &LlmClient,
    policy: &RetryPolicy,
) -> Result<ApplicationExtract, AppError> {
    let prompt = EXTRACT_PROMPT_TEMPLATE.replace("{input_text}", input_text);

    let raw = policy
        .run(|_| llm.call_json::<RawExtract>(&prompt, EXTRACT_SYSTEM))
        .await
        .map_err(|e| match e {
            RetryError::TimedOut(_) => {
                AppError::GatewayTimeout("The model timed out after multiple retries.".to_string())
            }
            RetryError::Exhausted { last, .. } => extraction_failed(last),
            RetryError::Aborted(e) => extraction_failed(e),
        })?;

    ApplicationExtract::try_from(raw).map_err(AppError::UnprocessableEntity)
}

fn extraction_failed(e: LlmError) -> AppError {
    AppError::Llm(format!("Application extraction failed: {e}"))
}
