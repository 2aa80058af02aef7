// LLM prompt constants for resume analysis.
// Section and whole-resume rewrite prompts live in templates.rs.

/// System prompt for resume scoring. Combined with the JSON-only instruction at call time.
pub const ANALYSIS_SYSTEM: &str = "You are an expert resume analyst. Analyze the resume provided and give:
1. A score out of 100
2. Specific feedback on improvements
3. Keywords found in the resume
4. Important keywords that should be added

Return a JSON object with this schema:
{
  \"score\": 0-100,
  \"feedback\": {\"<category>\": \"<suggestion>\"},
  \"suggestions\": [\"<improvement>\"],
  \"keywords_found\": [\"<keyword>\"],
  \"missing_keywords\": [\"<keyword>\"]
}";

/// Builds the user message for analysis.
pub fn analysis_prompt(content: &str, job_description: Option<&str>) -> String {
    let mut prompt = format!("Resume content:\n{content}");
    if let Some(jd) = job_description {
        prompt.push_str("\n\nJob Description:\n");
        prompt.push_str(jd);
    }
    prompt
}
