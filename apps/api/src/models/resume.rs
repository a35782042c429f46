use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Free-text resume columns, in the order they appear in the table.
pub const RESUME_FIELDS: [&str; 6] = [
    "skills",
    "experience",
    "knowledge",
    "education",
    "projects",
    "certifications",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub skills: Option<String>,
    pub experience: Option<String>,
    pub knowledge: Option<String>,
    pub education: Option<String>,
    pub projects: Option<String>,
    pub certifications: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRow {
    /// Looks up one of `RESUME_FIELDS` by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "skills" => self.skills.as_deref(),
            "experience" => self.experience.as_deref(),
            "knowledge" => self.knowledge.as_deref(),
            "education" => self.education.as_deref(),
            "projects" => self.projects.as_deref(),
            "certifications" => self.certifications.as_deref(),
            _ => None,
        }
    }
}
