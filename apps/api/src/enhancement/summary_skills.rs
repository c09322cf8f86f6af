//! Summary-and-skills enhancer: rewrites `personalInfo.summary`, normalizes skill names
//! and fills in missing skill levels.

use std::collections::HashSet;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::enhancement::intent::EnhancementContext;
use crate::enhancement::prompts::{render, SUMMARY_SKILLS_PROMPT_TEMPLATE};
use crate::enhancement::sanitize::cap_words;
use crate::llm_client::prompts::{IDENTIFIER_INSTRUCTION, JSON_ONLY_SYSTEM, STYLE_INSTRUCTION};
use crate::llm_client::transport::GenerateContentRequest;
use crate::llm_client::{GenerativeClient, ServiceError};
use crate::models::resume::{ResumeDocument, Skill, SkillCategory};
use crate::models::update::{PartialUpdate, PersonalInfoUpdate, SkillCategoryUpdate};

pub const STAGE: &str = "Summary and skills enhancement";
pub const SUMMARY_MAX_WORDS: usize = 60;

pub fn has_input(document: &ResumeDocument) -> bool {
    !document.personal_info.summary.trim().is_empty() || !document.skill_categories.is_empty()
}

fn input_json(document: &ResumeDocument) -> Value {
    let categories: Vec<Value> = document
        .skill_categories
        .iter()
        .map(|category| {
            let skills: Vec<Value> = category
                .skills
                .iter()
                .map(|s| json!({"id": s.id, "name": s.name, "level": s.level}))
                .collect();
            json!({"id": category.id, "name": category.name, "skills": skills})
        })
        .collect();

    json!({
        "summary": document.personal_info.summary,
        "skillCategories": categories,
    })
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "personalInfo": {
                "type": "OBJECT",
                "properties": {"summary": {"type": "STRING"}}
            },
            "skillCategories": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": {"type": "STRING"},
                        "skills": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "id": {"type": "STRING"},
                                    "name": {"type": "STRING"},
                                    "level": {
                                        "type": "STRING",
                                        "enum": ["Beginner", "Intermediate", "Advanced", "Expert"]
                                    }
                                },
                                "required": ["id", "name"]
                            }
                        }
                    },
                    "required": ["id", "skills"]
                }
            }
        }
    })
}

pub fn build_request(document: &ResumeDocument, context: &EnhancementContext) -> GenerateContentRequest {
    let input = serde_json::to_string_pretty(&input_json(document)).unwrap_or_default();
    let target = context.describe();
    let max_words = SUMMARY_MAX_WORDS.to_string();
    let prompt = render(
        SUMMARY_SKILLS_PROMPT_TEMPLATE,
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

/// Restricts the reply to this stage's sections and to ids that were in the input.
pub fn validate(raw: PartialUpdate, document: &ResumeDocument) -> PartialUpdate {
    if raw.projects.is_some() || raw.experiences.is_some() {
        debug!("{STAGE}: ignoring sections outside this stage");
    }

    let summary = raw.summary().and_then(|text| {
        let capped = cap_words(text, SUMMARY_MAX_WORDS);
        if capped.is_empty() {
            return None;
        }
        if text.split_whitespace().count() > SUMMARY_MAX_WORDS {
            warn!("{STAGE}: summary exceeded {SUMMARY_MAX_WORDS} words; truncated");
        }
        Some(capped)
    });

    let skill_categories = raw.skill_categories.map(|categories| {
        categories
            .into_iter()
            .filter_map(|update| {
                let Some(original) = document.skill_categories.iter().find(|c| c.id == update.id)
                else {
                    warn!("{STAGE}: dropping update for unknown skill category '{}'", update.id);
                    return None;
                };
                let skills = retain_known_skills(original, update.skills);
                if skills.is_empty() {
                    warn!(
                        "{STAGE}: dropping skill category '{}' with no usable skills",
                        update.id
                    );
                    return None;
                }
                Some(SkillCategoryUpdate {
                    id: update.id,
                    skills,
                })
            })
            .collect()
    });

    PartialUpdate {
        personal_info: summary.map(|s| PersonalInfoUpdate { summary: Some(s) }),
        skill_categories,
        projects: None,
        experiences: None,
    }
}

fn retain_known_skills(original: &SkillCategory, skills: Vec<Skill>) -> Vec<Skill> {
    let known: HashSet<&str> = original.skills.iter().map(|s| s.id.as_str()).collect();
    let mut seen = HashSet::new();

    skills
        .into_iter()
        .filter_map(|mut skill| {
            if !known.contains(skill.id.as_str()) {
                warn!(
                    "{STAGE}: dropping invented skill '{}' in category '{}'",
                    skill.id, original.id
                );
                return None;
            }
            if !seen.insert(skill.id.clone()) {
                return None;
            }
            skill.name = skill.name.trim().to_string();
            if skill.name.is_empty() {
                return None;
            }
            Some(skill)
        })
        .collect()
}
