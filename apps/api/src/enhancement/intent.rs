//! Intent classifier: turns the latest user message plus the transcript into an `Intent`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::enhancement::prompts::{render, INTENT_PROMPT_TEMPLATE};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::transport::GenerateContentRequest;
use crate::llm_client::{GenerativeClient, ServiceError};
use crate::models::conversation::{ConversationMessage, Role};

pub const STAGE: &str = "Intent classification";
pub const DEFAULT_PROFESSION: &str = "General Professional";

/// Only the most recent turns are sent to the classifier.
const HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    Conversation,
    JobDescriptionRequest,
    OverallEnhanceRequest,
    ProvideProfession,
    #[serde(other)]
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(rename = "intent")]
    pub kind: IntentKind,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub job_description: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub profession: Option<String>,
}

/// What the enhancers tailor the document towards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhancementContext {
    JobDescription(String),
    Profession(String),
}

impl EnhancementContext {
    /// Job description text wins; otherwise the named profession, else the generic label.
    pub fn from_intent(intent: &Intent) -> Self {
        match (&intent.job_description, &intent.profession) {
            (Some(jd), _) => EnhancementContext::JobDescription(jd.clone()),
            (None, Some(profession)) => EnhancementContext::Profession(profession.clone()),
            (None, None) => EnhancementContext::Profession(DEFAULT_PROFESSION.to_string()),
        }
    }

    /// Targeting paragraph placed at the top of every enhancer prompt.
    pub fn describe(&self) -> String {
        match self {
            EnhancementContext::JobDescription(jd) => format!(
                "TARGET: Tailor the content to the following job description. Mirror its \
                 terminology and priorities where the candidate's facts support it.\n\
                 JOB DESCRIPTION:\n{jd}"
            ),
            EnhancementContext::Profession(profession) => format!(
                "TARGET: Enhance the content for the profession/industry: {profession}. \
                 Use the vocabulary and impact metrics valued in that field."
            ),
        }
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "intent": {
                "type": "STRING",
                "enum": [
                    "CONVERSATION",
                    "JOB_DESCRIPTION_REQUEST",
                    "OVERALL_ENHANCE_REQUEST",
                    "PROVIDE_PROFESSION",
                    "INVALID"
                ]
            },
            "jobDescription": {"type": "STRING", "nullable": true},
            "profession": {"type": "STRING", "nullable": true}
        },
        "required": ["intent"]
    })
}

fn render_history(history: &[ConversationMessage]) -> String {
    if history.is_empty() {
        return "(no previous messages)".to_string();
    }
    let skip = history.len().saturating_sub(HISTORY_WINDOW);
    history[skip..]
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{speaker}: {}", m.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_request(user_input: &str, history: &[ConversationMessage]) -> GenerateContentRequest {
    let history = render_history(history);
    let prompt = render(
        INTENT_PROMPT_TEMPLATE,
        &[("history", history.as_str()), ("user_input", user_input)],
    );
    GenerateContentRequest::json(JSON_ONLY_SYSTEM, prompt)
        .with_schema(response_schema())
        .with_temperature(0.0)
}

/// Classifies the user's message. One call through the shared client; failure is fatal
/// to the orchestration.
pub async fn classify(
    client: &GenerativeClient,
    user_input: &str,
    history: &[ConversationMessage],
    cancel: &CancellationToken,
) -> Result<Intent, ServiceError> {
    let request = build_request(user_input, history);
    client.invoke::<Intent>(STAGE, &request, cancel).await
}
