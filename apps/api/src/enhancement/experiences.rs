//! Experiences enhancer: rewrites each experience's `description` as newline-separated
//! achievement lines.

use std::collections::HashSet;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::enhancement::intent::EnhancementContext;
use crate::enhancement::prompts::{render, EXPERIENCES_PROMPT_TEMPLATE};
use crate::enhancement::sanitize::retain_known_descriptions;
use crate::llm_client::prompts::{IDENTIFIER_INSTRUCTION, JSON_ONLY_SYSTEM, STYLE_INSTRUCTION};
use crate::llm_client::transport::GenerateContentRequest;
use crate::llm_client::{GenerativeClient, ServiceError};
use crate::models::resume::ResumeDocument;
use crate::models::update::PartialUpdate;

pub const STAGE: &str = "Experiences enhancement";
pub const DESCRIPTION_MAX_WORDS: usize = 100;

pub fn has_input(document: &ResumeDocument) -> bool {
    !document.experiences.is_empty()
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "experiences": {
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
        "required": ["experiences"]
    })
}

pub fn build_request(document: &ResumeDocument, context: &EnhancementContext) -> GenerateContentRequest {
    let input: Vec<Value> = document
        .experiences
        .iter()
        .map(|e| {
            // Role, company and dates help the model pick plausible metrics.
            let mut entry = e.extra.clone();
            entry.insert("id".to_string(), json!(e.id));
            entry.insert("description".to_string(), json!(e.description));
            Value::Object(entry)
        })
        .collect();
    let input = serde_json::to_string_pretty(&input).unwrap_or_default();

    let target = context.describe();
    let max_words = DESCRIPTION_MAX_WORDS.to_string();
    let prompt = render(
        EXPERIENCES_PROMPT_TEMPLATE,
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
    if raw.personal_info.is_some() || raw.skill_categories.is_some() || raw.projects.is_some() {
        debug!("{STAGE}: ignoring sections outside this stage");
    }
    let known: HashSet<&str> = document.experiences.iter().map(|e| e.id.as_str()).collect();

    PartialUpdate {
        experiences: raw
            .experiences
            .map(|updates| retain_known_descriptions(STAGE, updates, &known)),
        ..Default::default()
    }
}
