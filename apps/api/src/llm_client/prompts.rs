// Cross-cutting prompt fragments shared by every caller of the LLM client.
// Feature-specific prompts live next to the feature (see optimizer::prompts).

/// Appended to system prompts whose replies are parsed as JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "Respond with a single valid JSON object. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Joins a feature system prompt with the JSON-only instruction.
pub fn json_system(base: &str) -> String {
    format!("{}\n\n{}", base.trim_end(), JSON_ONLY_INSTRUCTION)
}
