//! Typed analysis record and the lenient parser for the model's JSON reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis reply is not a JSON object")]
    NotAnObject,

    #[error("score is not numeric: {0}")]
    InvalidScore(String),

    #[error("score {0} is outside 0-100")]
    ScoreOutOfRange(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub category: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeAnalysis {
    /// 0 – 100
    pub score: f64,
    pub feedback: Vec<FeedbackItem>,
    pub suggestions: Vec<String>,
    pub keywords_found: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub analysis_date: DateTime<Utc>,
}

/// Converts the model's JSON reply into a `ResumeAnalysis` stamped with the current time.
pub fn parse_analysis(raw: &Value) -> Result<ResumeAnalysis, AnalysisError> {
    let obj = raw.as_object().ok_or(AnalysisError::NotAnObject)?;

    let score = match obj.get("score") {
        None | Some(Value::Null) => 0.0,
        Some(v) => parse_score(v)?,
    };
    if !(0.0..=MAX_SCORE).contains(&score) {
        return Err(AnalysisError::ScoreOutOfRange(score));
    }

    Ok(ResumeAnalysis {
        score,
        feedback: obj.get("feedback").map(parse_feedback).unwrap_or_default(),
        suggestions: string_list(obj.get("suggestions")),
        keywords_found: string_list(obj.get("keywords_found")),
        missing_keywords: string_list(obj.get("missing_keywords")),
        analysis_date: Utc::now(),
    })
}

fn parse_score(value: &Value) -> Result<f64, AnalysisError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| AnalysisError::InvalidScore(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| AnalysisError::InvalidScore(s.clone())),
        other => Err(AnalysisError::InvalidScore(other.to_string())),
    }
}

/// Accepts `{category: suggestion}`, `[{category, suggestion}]` or `["suggestion"]`.
fn parse_feedback(value: &Value) -> Vec<FeedbackItem> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(category, suggestion)| FeedbackItem {
                category: category.clone(),
                suggestion: value_text(suggestion),
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(FeedbackItem {
                    category: "general".to_string(),
                    suggestion: s.clone(),
                }),
                Value::Object(fields) => {
                    let suggestion = fields.get("suggestion").map(value_text)?;
                    let category = fields
                        .get("category")
                        .and_then(Value::as_str)
                        .unwrap_or("general")
                        .to_string();
                    Some(FeedbackItem {
                        category,
                        suggestion,
                    })
                }
                _ => None,
            })
            .collect(),
        Value::String(s) => vec![FeedbackItem {
            category: "general".to_string(),
            suggestion: s.clone(),
        }],
        _ => Vec::new(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_full_reply() {
        let raw = json!({
            "score": 82,
            "feedback": {"formatting": "Use consistent dates", "impact": "Quantify results"},
            "suggestions": ["Add a summary"],
            "keywords_found": ["Rust", "Kubernetes"],
            "missing_keywords": ["Terraform"]
        });
        let analysis = parse_analysis(&raw).unwrap();

        assert_eq!(analysis.score, 82.0);
        assert_eq!(analysis.feedback.len(), 2);
        assert_eq!(analysis.feedback[0].category, "formatting");
        assert_eq!(analysis.feedback[1].suggestion, "Quantify results");
        assert_eq!(analysis.suggestions, vec!["Add a summary".to_string()]);
        assert_eq!(analysis.keywords_found.len(), 2);
        assert_eq!(analysis.missing_keywords, vec!["Terraform".to_string()]);
    }

    #[test]
    fn test_missing_fields_default() {
        let analysis = parse_analysis(&json!({})).unwrap();
        assert_eq!(analysis.score, 0.0);
        assert!(analysis.feedback.is_empty());
        assert!(analysis.suggestions.is_empty());
    }

    #[test]
    fn test_score_may_be_numeric_string() {
        let analysis = parse_analysis(&json!({"score": " 67.5 "})).unwrap();
        assert_eq!(analysis.score, 67.5);
    }

    #[test]
    fn test_score_out_of_range_is_rejected() {
        assert!(matches!(
            parse_analysis(&json!({"score": 140})),
            Err(AnalysisError::ScoreOutOfRange(_))
        ));
        assert!(matches!(
            parse_analysis(&json!({"score": "high"})),
            Err(AnalysisError::InvalidScore(_))
        ));
    }

    #[test]
    fn test_feedback_array_forms() {
        let raw = json!({
            "feedback": [
                {"category": "skills", "suggestion": "Group by domain"},
                "Shorten the summary",
                {"suggestion": {"detail": "nested"}},
                42
            ]
        });
        let analysis = parse_analysis(&raw).unwrap();

        assert_eq!(analysis.feedback.len(), 3);
        assert_eq!(analysis.feedback[0].category, "skills");
        assert_eq!(analysis.feedback[1].category, "general");
        assert_eq!(analysis.feedback[2].suggestion, r#"{"detail":"nested"}"#);
    }

    #[test]
    fn test_feedback_object_keeps_reply_order() {
        let raw: Value = serde_json::from_str(
            r#"{"feedback": {"zeta": "Last alphabetically", "alpha": "First alphabetically", "mid": "x"}}"#,
        )
        .unwrap();
        let analysis = parse_analysis(&raw).unwrap();

        let categories: Vec<_> = analysis.feedback.iter().map(|f| f.category.as_str()).collect();
        assert_eq!(categories, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_non_string_list_items_are_ignored() {
        let analysis = parse_analysis(&json!({"keywords_found": ["Rust", 3, null, "SQL"]})).unwrap();
        assert_eq!(analysis.keywords_found, vec!["Rust".to_string(), "SQL".to_string()]);
    }

    #[test]
    fn test_non_object_reply_is_rejected() {
        assert!(matches!(
            parse_analysis(&json!(["score", 80])),
            Err(AnalysisError::NotAnObject)
        ));
    }
}
