//! ResumeOptimizer ties classification, templating, generation and sanitizing together.
//!
//! Flow for a whole resume: classify_sections → resume_prompt → LLM → sanitize.
//! Per-section rewrites degrade gracefully: a failed call yields the original text.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::errors::AppError;
use crate::llm_client::prompts::json_system;
use crate::llm_client::{
    parse_json_reply, CompletionRequest, TextGenerator, ANALYSIS_PARAMS, RESUME_PARAMS,
    SECTION_PARAMS,
};
use crate::optimizer::analysis::{parse_analysis, ResumeAnalysis};
use crate::optimizer::prompts::{analysis_prompt, ANALYSIS_SYSTEM};
use crate::optimizer::sanitize::sanitize;
use crate::optimizer::sections::{SectionKey, SectionMap};
use crate::optimizer::templates::{resume_prompt, section_prompt};

#[derive(Clone)]
pub struct ResumeOptimizer {
    generator: Arc<dyn TextGenerator>,
}

impl ResumeOptimizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Rewrites one section. Returns `content` unchanged if anything fails.
    pub async fn optimize_section(
        &self,
        key: SectionKey,
        content: &str,
        job_title: Option<&str>,
    ) -> String {
        match self.try_optimize_section(key, content, job_title).await {
            Ok(optimized) => optimized,
            Err(e) => {
                error!("Error optimizing {key}: {e}");
                content.to_string()
            }
        }
    }

    async fn try_optimize_section(
        &self,
        key: SectionKey,
        content: &str,
        job_title: Option<&str>,
    ) -> Result<String, AppError> {
        let prompt = section_prompt(key, content, job_title)?;
        let generated = self
            .generator
            .complete(CompletionRequest {
                system: None,
                prompt: &prompt,
                params: SECTION_PARAMS,
            })
            .await?;
        Ok(sanitize(&generated))
    }

    /// Rewrites every section in order, one call per section.
    pub async fn optimize_sections(
        &self,
        sections: &SectionMap,
        job_title: Option<&str>,
    ) -> SectionMap {
        let mut optimized = SectionMap::new();
        for (key, content) in sections.iter() {
            let text = self.optimize_section(key, content, job_title).await;
            optimized.insert(key, text);
        }
        optimized
    }

    /// Generates a cohesive resume from classified sections.
    ///
    /// Sanitizing squeezes all whitespace, so the line split afterwards normally leaves a
    /// single line; bullet structure from the model does not survive.
    pub async fn generate_optimized_resume(
        &self,
        sections: &SectionMap,
        job_title: Option<&str>,
    ) -> Result<String, AppError> {
        let prompt = resume_prompt(sections, job_title)?;
        let generated = self
            .generator
            .complete(CompletionRequest {
                system: None,
                prompt: &prompt,
                params: RESUME_PARAMS,
            })
            .await
            .map_err(|e| AppError::Llm(format!("Resume generation failed: {e}")))?;

        let cleaned = sanitize(&generated);
        let lines: Vec<&str> = cleaned
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        info!(
            "Generated optimized resume from {} sections ({} chars)",
            sections.len(),
            cleaned.len()
        );
        Ok(lines.join("\n"))
    }

    /// Scores resume text, optionally against a job description.
    pub async fn analyze_resume(
        &self,
        content: &str,
        job_description: Option<&str>,
    ) -> Result<ResumeAnalysis, AppError> {
        let system = json_system(ANALYSIS_SYSTEM);
        let prompt = analysis_prompt(content, job_description);

        let reply = self
            .generator
            .complete(CompletionRequest {
                system: Some(&system),
                prompt: &prompt,
                params: ANALYSIS_PARAMS,
            })
            .await
            .map_err(|e| AppError::Llm(format!("Resume analysis failed: {e}")))?;

        let raw: Value = parse_json_reply(&reply)
            .map_err(|e| AppError::Llm(format!("Resume analysis returned invalid JSON: {e}")))?;

        parse_analysis(&raw)
            .map_err(|e| AppError::Llm(format!("Resume analysis was malformed: {e}")))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm_client::{CompletionParams, LlmError};
    use crate::optimizer::sections::classify_sections;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies in order and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        pub(crate) calls: Mutex<Vec<(Option<String>, String, CompletionParams)>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(_, p, _)| p.clone())
                .collect()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push((
                request.system.map(String::from),
                request.prompt.to_string(),
                request.params,
            ));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyContent))
        }
    }

    fn optimizer(generator: &Arc<ScriptedGenerator>) -> ResumeOptimizer {
        ResumeOptimizer::new(generator.clone())
    }

    #[tokio::test]
    async fn test_optimize_section_sanitizes_reply() {
        let generator = ScriptedGenerator::new(vec![Ok(
            "- Company: Acme\n- Position: Engineer Engineer\n".to_string()
        )]);
        let out = optimizer(&generator)
            .optimize_section(SectionKey::Experience, "Acme, engineer", Some("SRE"))
            .await;

        assert_eq!(out, "- Company: Acme - Position: Engineer");
        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.contains("for a SRE position:\nAcme, engineer"));
        assert_eq!(calls[0].2, SECTION_PARAMS);
    }

    #[tokio::test]
    async fn test_optimize_section_falls_back_to_original_on_error() {
        let generator = ScriptedGenerator::new(vec![Err(LlmError::Api {
            status: 400,
            message: "bad request".to_string(),
        })]);
        let out = optimizer(&generator)
            .optimize_section(SectionKey::Skills, "Rust\nSQL", None)
            .await;

        assert_eq!(out, "Rust\nSQL");
    }

    #[tokio::test]
    async fn test_optimize_sections_keeps_order_and_falls_back_per_section() {
        let generator = ScriptedGenerator::new(vec![
            Ok("Email: jane@example.com".to_string()),
            Err(LlmError::EmptyContent),
        ]);
        let sections = classify_sections("Contact\njane@example.com\nSkills\nRust");
        let out = optimizer(&generator).optimize_sections(&sections, None).await;

        let keys: Vec<_> = out.keys().collect();
        assert_eq!(keys, vec![SectionKey::Contact, SectionKey::Skills]);
        assert_eq!(out.get(SectionKey::Contact), Some("Email: jane@example.com"));
        assert_eq!(out.get(SectionKey::Skills), Some("Rust"));
    }

    #[tokio::test]
    async fn test_generate_optimized_resume_flattens_lines() {
        let generator = ScriptedGenerator::new(vec![Ok(
            "JANE DOE\n\nEXPERIENCE\n- Built Built a cache\n\nSKILLS\n- Rust".to_string(),
        )]);
        let sections = classify_sections("Experience\nBuilt a cache\nSkills\nRust");
        let out = optimizer(&generator)
            .generate_optimized_resume(&sections, Some("Backend Engineer"))
            .await
            .unwrap();

        assert_eq!(out, "JANE DOE EXPERIENCE - Built a cache SKILLS - Rust");
        let prompts = generator.prompts();
        assert!(prompts[0].contains("for a Backend Engineer position"));
        assert!(prompts[0].contains("Professional Experience:\nBuilt a cache"));
        assert!(prompts[0].contains("Contact Information:\n\n"));
    }

    #[tokio::test]
    async fn test_generate_optimized_resume_propagates_errors() {
        let generator = ScriptedGenerator::new(vec![Err(LlmError::EmptyContent)]);
        let result = optimizer(&generator)
            .generate_optimized_resume(&SectionMap::new(), None)
            .await;

        assert!(matches!(result, Err(AppError::Llm(_))));
    }

    #[tokio::test]
    async fn test_analyze_resume_parses_fenced_json() {
        let generator = ScriptedGenerator::new(vec![Ok(r#"```json
{"score": 74, "feedback": {"impact": "Add metrics"}, "keywords_found": ["Rust"]}
```"#
            .to_string())]);
        let analysis = optimizer(&generator)
            .analyze_resume("Rust developer", Some("Title: SRE"))
            .await
            .unwrap();

        assert_eq!(analysis.score, 74.0);
        assert_eq!(analysis.feedback[0].category, "impact");

        let calls = generator.calls.lock().unwrap();
        let (system, prompt, params) = &calls[0];
        assert!(system.as_deref().unwrap_or("").starts_with("You are an expert resume analyst"));
        assert_eq!(prompt, "Resume content:\nRust developer\n\nJob Description:\nTitle: SRE");
        assert!(params.json_object);
    }

    #[tokio::test]
    async fn test_analyze_resume_rejects_invalid_json() {
        let generator = ScriptedGenerator::new(vec![Ok("score: 80".to_string())]);
        let result = optimizer(&generator).analyze_resume("text", None).await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }
}
