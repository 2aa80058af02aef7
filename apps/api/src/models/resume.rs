use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::optimizer::analysis::ResumeAnalysis;

/// Row of the `resumes` table.
#[derive(Debug, Clone, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub file_type: String,
    pub file_path: Option<String>,
    pub file_url: Option<String>,
    pub original_filename: Option<String>,
    pub analysis: Option<Json<ResumeAnalysis>>,
    pub optimized_content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resume as returned by the API. The storage key stays server-side.
#[derive(Debug, Clone, Serialize)]
pub struct Resume {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub file_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub analysis: Option<ResumeAnalysis>,
    pub optimized_content: Option<String>,
    pub original_filename: Option<String>,
    pub file_url: Option<String>,
}

impl From<ResumeRow> for Resume {
    fn from(row: ResumeRow) -> Self {
        Resume {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            content: row.content,
            file_type: row.file_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
            analysis: row.analysis.map(|Json(a)| a),
            optimized_content: row.optimized_content,
            original_filename: row.original_filename,
            file_url: row.file_url,
        }
    }
}

/// Fields for a new resume record.
#[derive(Debug, Clone)]
pub struct ResumeCreate {
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub file_type: String,
    pub file_path: String,
    pub file_url: String,
    pub original_filename: String,
    pub analysis: Option<ResumeAnalysis>,
}

/// Partial update from `PUT /resumes/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResumeUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub file_type: Option<String>,
}

/// Every column an update may touch. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct ResumeChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub file_type: Option<String>,
    pub optimized_content: Option<String>,
    pub analysis: Option<ResumeAnalysis>,
}

impl From<ResumeUpdate> for ResumeChanges {
    fn from(update: ResumeUpdate) -> Self {
        ResumeChanges {
            title: update.title,
            content: update.content,
            file_type: update.file_type,
            ..Default::default()
        }
    }
}

/// Target job for analysis and optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub requirements: Option<Vec<String>>,
}

impl JobDescription {
    /// Plain-text rendering used inside prompts.
    pub fn to_prompt_text(&self) -> String {
        let mut text = format!("Title: {}\n", self.title);
        if let Some(company) = &self.company {
            text.push_str(&format!("Company: {company}\n"));
        }
        text.push_str(&format!("Description: {}", self.description));
        if let Some(reqs) = self.requirements.as_ref().filter(|r| !r.is_empty()) {
            text.push_str("\nRequirements:");
            for req in reqs {
                text.push_str(&format!("\n- {req}"));
            }
        }
        text
    }
}

fn default_optimization_level() -> String {
    "standard".to_string()
}

/// Body of `POST /resumes/:id/optimize`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResumeOptimizationRequest {
    pub resume_id: Uuid,
    #[serde(default)]
    pub job_description: Option<JobDescription>,
    /// standard | advanced | professional
    #[serde(default = "default_optimization_level")]
    pub optimization_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_description_prompt_text() {
        let jd = JobDescription {
            title: "Backend Engineer".to_string(),
            description: "Build APIs".to_string(),
            company: Some("Acme".to_string()),
            requirements: Some(vec!["Rust".to_string(), "Postgres".to_string()]),
        };
        assert_eq!(
            jd.to_prompt_text(),
            "Title: Backend Engineer\nCompany: Acme\nDescription: Build APIs\nRequirements:\n- Rust\n- Postgres"
        );
    }

    #[test]
    fn test_job_description_optional_fields() {
        let jd: JobDescription =
            serde_json::from_value(json!({"title": "SRE", "description": "Keep it up"})).unwrap();
        assert_eq!(jd.to_prompt_text(), "Title: SRE\nDescription: Keep it up");
    }

    #[test]
    fn test_optimization_request_defaults_level() {
        let req: ResumeOptimizationRequest =
            serde_json::from_value(json!({"resume_id": Uuid::nil()})).unwrap();
        assert_eq!(req.optimization_level, "standard");
        assert!(req.job_description.is_none());
    }

    #[test]
    fn test_update_converts_to_changes() {
        let update: ResumeUpdate = serde_json::from_value(json!({"content": "new"})).unwrap();
        let changes = ResumeChanges::from(update);
        assert_eq!(changes.content.as_deref(), Some("new"));
        assert!(changes.title.is_none());
        assert!(changes.analysis.is_none());
    }
}
