//! Projects enhancer: rewrites each project's `description` as an overview line followed
//! by quantified achievement lines.

use std::collections::HashSet;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::enhancement::intent::EnhancementContext;
use crate::enhancement::prompts::{render, PROJECTS_PROMPT_TEMPLATE};
use crate::enhancement::sanitize::retain_known_descriptions;
use crate::llm_client::prompts::{IDENTIFIER_INSTRUCTION, JSON_ONLY_SYSTEM, STYLE_INSTRUCTION};
use crate::llm_client::transport::GenerateContentRequest;
use crate::llm_client::{GenerativeClient, ServiceError};
use crate::models::resume::ResumeDocument;
use crate::models::update::PartialUpdate;

pub const STAGE: &str = "Projects enhancement";
pub const DESCRIPTION_MAX_WORDS: usize = 80;

pub fn has_input(document: &ResumeDocument) -> bool {
    !document.projects.is_empty()
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "projects": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": {"type": "STRING"},
                        "description": {"type": "STRING"}
                    },
                    "required": ["id", "description"]
                }
            }
        },
        "required": ["projects"]
    })
}

pub fn build_request(document: &ResumeDocument, context: &EnhancementContext) -> GenerateContentRequest {
    let input: Vec<Value> = document
        .projects
        .iter()
        .map(|p| {
            // Neighbouring fields (name, tech stack) give the model something to quantify.
            let mut entry = p.extra.clone();
            entry.insert("id".to_string(), json!(p.id));
            entry.insert("description".to_string(), json!(p.description));
            Value::Object(entry)
        })
        .collect();
    let input = serde_json::to_string_pretty(&input).unwrap_or_default();

    let target = context.describe();
    let max_words = DESCRIPTION_MAX_WORDS.to_string();
    let prompt = render(
        PROJECTS_PROMPT_TEMPLATE,
        &[
            ("target", target.as_str()),
            ("identifier_instruction", IDENTIFIER_INSTRUCTION),
            ("style_instruction", STYLE_INSTRUCTION),
            ("max_words", max_words.as_str()),
            ("input_json", input.as_str()),
        ],
    );
    GenerateContentRequest::json(JSON_ONLY_SYSTEM, prompt).with_schema(response_schema())
}

pub async fn enhance(
    client: &GenerativeClient,
    document: &ResumeDocument,
    context: &EnhancementContext,
    cancel: &CancellationToken,
) -> Result<PartialUpdate, ServiceError> {
    let request = build_request(document, context);
    let raw: PartialUpdate = client.invoke(STAGE, &request, cancel).await?;
    Ok(validate(raw, document))
}

pub fn validate(raw: PartialUpdate, document: &ResumeDocument) -> PartialUpdate {
    if raw.personal_info.is_some() || raw.skill_categories.is_some() || raw.experiences.is_some() {
        debug!("{STAGE}: ignoring sections outside this stage");
    }
    let known: HashSet<&str> = document.projects.iter().map(|p| p.id.as_str()).collect();

    PartialUpdate {
        projects: raw
            .projects
            .map(|updates| retain_known_descriptions(STAGE, updates, &known)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm_client::rate_limiter::RateLimiter;
    use crate::llm_client::transport::testing::{Reply, ScriptedTransport};
    use crate::llm_client::RetryPolicy;
    use crate::models::resume::Project;
    use crate::models::update::DescriptionUpdate;

    const MARKER: &str = "TASK: ENHANCE PROJECT DESCRIPTIONS";

    fn document() -> ResumeDocument {
        let mut project = Project::new("p1", "made a todo app");
        project
            .extra
            .insert("name".to_string(), json!("Taskr"));
        ResumeDocument {
            projects: vec![project],
            ..Default::default()
        }
    }

    #[test]
    fn test_prompt_includes_project_context() {
        let context = EnhancementContext::JobDescription("Mobile developer, React Native".to_string());
        let text = build_request(&document(), &context).prompt_text();
        assert!(text.contains(MARKER));
        assert!(text.contains("\"name\": \"Taskr\""));
        assert!(text.contains("made a todo app"));
        assert!(text.contains("React Native"));
    }

    #[test]
    fn test_job_description_placeholders_are_not_expanded() {
        let context =
            EnhancementContext::JobDescription("Paste {input_json} here, max {max_words}".to_string());
        let text = build_request(&document(), &context).prompt_text();
        assert!(text.contains("Paste {input_json} here, max {max_words}"));
        assert_eq!(text.matches("made a todo app").count(), 1);
    }

    #[test]
    fn test_validate_keeps_only_projects() {
        let raw: PartialUpdate = serde_json::from_value(json!({
            "personalInfo": {"summary": "hijacked"},
            "projects": [
                {"id": "p1", "description": "Built Taskr.\n• Grew to 2k users"},
                {"id": "zz", "description": "Hallucinated"}
            ]
        }))
        .unwrap();

        let update = validate(raw, &document());
        assert!(update.personal_info.is_none());
        assert_eq!(
            update.projects,
            Some(vec![DescriptionUpdate {
                id: "p1".to_string(),
                description: "Built Taskr.\nGrew to 2k users".to_string(),
            }])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_enhance_failure_surfaces_service_error() {
        let transport = Arc::new(ScriptedTransport::new().on(MARKER, vec![Reply::status(503)]));
        let client = GenerativeClient::new(
            transport.clone(),
            Arc::new(RateLimiter::default()),
            RetryPolicy::default(),
        );

        let err = enhance(
            &client,
            &document(),
            &EnhancementContext::Profession("General Professional".to_string()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.stage, STAGE);
        assert_eq!(transport.calls(MARKER), 3);
    }
}
