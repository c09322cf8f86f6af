// AI content enhancement: intent classification, three independent section enhancers,
// and the id-based merge that reconciles their output into the resume document.
// All generative calls go through llm_client; no direct HTTP calls here.

pub mod experiences;
pub mod handlers;
pub mod intent;
pub mod merge;
pub mod orchestrator;
pub mod projects;
pub mod prompts;
pub mod sanitize;
pub mod summary_skills;
