// Resume optimization pipeline: extract → classify → template → generate → sanitize,
// plus structured analysis. All LLM calls go through llm_client.

pub mod analysis;
pub mod extract;
pub mod prompts;
pub mod sanitize;
pub mod sections;
pub mod service;
pub mod templates;

pub use service::ResumeOptimizer;
