use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a job application.
/// draft → applied → screened → interviewed → selected | rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Draft,
    Applied,
    Screened,
    Interviewed,
    Selected,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Applied => "applied",
            Self::Screened => "screened",
            Self::Interviewed => "interviewed",
            Self::Selected => "selected",
            Self::Rejected => "rejected",
        }
    }

    /// Every status past draft must point at the resume that was sent.
    pub fn requires_resume(&self) -> bool {
        !matches!(self, Self::Draft)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "applied" => Ok(Self::Applied),
            "screened" => Ok(Self::Screened),
            "interviewed" => Ok(Self::Interviewed),
            "selected" => Ok(Self::Selected),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown application status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resume_id: Option<Uuid>,
    pub job_role: String,
    pub job_description: String,
    pub company_name: String,
    pub company_description: Option<String>,
    pub final_date: Option<NaiveDate>,
    pub response: Option<Value>,
    pub status: String,
    pub applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_draft_may_omit_resume() {
        assert!(!ApplicationStatus::Draft.requires_resume());
        for status in [
            ApplicationStatus::Applied,
            ApplicationStatus::Screened,
            ApplicationStatus::Interviewed,
            ApplicationStatus::Selected,
            ApplicationStatus::Rejected,
        ] {
            assert!(status.requires_resume(), "{status} should require a resume");
        }
    }

    #[test]
    fn test_status_text_matches_serde_and_sql() {
        let json = serde_json::to_string(&ApplicationStatus::Interviewed).unwrap();
        assert_eq!(json, "\"interviewed\"");
        assert_eq!(
            "interviewed".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::Interviewed
        );
        assert!("hired".parse::<ApplicationStatus>().is_err());
    }
}
