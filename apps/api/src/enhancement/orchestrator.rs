//! Orchestration driver.
//!
//! Flow: validate input → classify intent → (terminal reply | three enhancers run
//! concurrently) → fold successful updates → merge once → respond.
//!
//! Enhancer failures are absorbed: a failed stage contributes nothing to the merge and
//! the request still completes with the fixed completion message. Only invalid input
//! and classification failure surface as errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::enhancement::intent::{classify, EnhancementContext, Intent, IntentKind};
use crate::enhancement::merge::merge;
use crate::enhancement::{experiences, projects, summary_skills};
use crate::llm_client::{GenerativeClient, ServiceError};
use crate::models::conversation::ConversationMessage;
use crate::models::resume::ResumeDocument;
use crate::models::update::PartialUpdate;

pub const GREETING_MESSAGE: &str = "Hi! I can help improve your resume in two ways:\n\
    1. Tailor it to a specific job: paste the complete job description.\n\
    2. Enhance it overall for a profession or industry: tell me which one (e.g. \"Data Analyst\" or \"Healthcare\").\n\
    What would you like to do?";

pub const ASK_FOR_JOB_DESCRIPTION_MESSAGE: &str = "Happy to tailor your resume to a job. \
    Please paste the complete job description, including responsibilities and requirements.";

pub const ASK_FOR_PROFESSION_MESSAGE: &str = "Sure, I can enhance your whole resume. \
    Which profession or industry should I target? For example \"Software Engineer\", \
    \"Marketing Manager\" or \"Finance\".";

pub const CLARIFY_MESSAGE: &str = "Sorry, I didn't quite get that. I can either:\n\
    1. Tailor your resume to a job description you paste in, or\n\
    2. Enhance it for a profession or industry you name.\n\
    Which would you like?";

pub const ENHANCEMENT_COMPLETE_MESSAGE: &str = "Your resume has been enhanced! \
    I've refined your summary, skills, projects and experience. \
    Review the changes and let me know if you'd like any adjustments.";

// ────────────────────────────────────────────────────────────────────────────
// Request / response
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceRequest {
    pub document: Option<ResumeDocument>,
    pub user_input: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<ConversationMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceResponse {
    pub updated_document: ResumeDocument,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Intent classification failed: {0}")]
    Classification(#[source] ServiceError),

    #[error("Enhancement cancelled")]
    Cancelled,
}

impl EnhanceRequest {
    fn into_parts(
        self,
    ) -> Result<(ResumeDocument, String, Vec<ConversationMessage>), OrchestrationError> {
        let document = self
            .document
            .ok_or_else(|| OrchestrationError::InvalidInput("document is required".to_string()))?;
        let user_input = self
            .user_input
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OrchestrationError::InvalidInput("userInput is required".to_string()))?;
        Ok((document, user_input, self.chat_history))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Intent routing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Terminal: answer with this message and the unchanged document.
    Reply(&'static str),
    Enhance(EnhancementContext),
}

pub fn route(intent: &Intent) -> Route {
    match intent.kind {
        IntentKind::Conversation => Route::Reply(GREETING_MESSAGE),
        IntentKind::JobDescriptionRequest if intent.job_description.is_none() => {
            Route::Reply(ASK_FOR_JOB_DESCRIPTION_MESSAGE)
        }
        IntentKind::OverallEnhanceRequest => Route::Reply(ASK_FOR_PROFESSION_MESSAGE),
        IntentKind::Invalid => Route::Reply(CLARIFY_MESSAGE),
        IntentKind::JobDescriptionRequest | IntentKind::ProvideProfession => {
            Route::Enhance(EnhancementContext::from_intent(intent))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage outcomes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    SummaryAndSkills,
    Projects,
    Experiences,
}

impl Section {
    pub fn stage(self) -> &'static str {
        match self {
            Section::SummaryAndSkills => summary_skills::STAGE,
            Section::Projects => projects::STAGE,
            Section::Experiences => experiences::STAGE,
        }
    }
}

#[derive(Debug)]
pub enum StageOutcome {
    Updated(PartialUpdate),
    /// The document had nothing for this stage to work on; no call was made.
    Skipped,
    Failed(ServiceError),
}

#[derive(Debug)]
pub struct StageReport {
    pub section: Section,
    pub outcome: StageOutcome,
}

/// Folds successful stage updates into one combined update. Failures and skips add nothing.
pub fn combine(reports: Vec<StageReport>) -> PartialUpdate {
    let mut combined = PartialUpdate::default();
    let (mut updated, mut skipped, mut failed) = (0, 0, 0);

    for report in reports {
        let stage = report.section.stage();
        match report.outcome {
            StageOutcome::Updated(update) => {
                updated += 1;
                debug!("{stage}: update received");
                combined.absorb(update);
            }
            StageOutcome::Skipped => skipped += 1,
            StageOutcome::Failed(e) => {
                failed += 1;
                warn!("{stage}: failed, continuing without it: {e}");
            }
        }
    }

    info!("Enhancement stages: {updated} updated, {skipped} skipped, {failed} failed");
    combined
}

async fn run_stage<F>(section: Section, has_input: bool, stage: F) -> StageReport
where
    F: std::future::Future<Output = Result<PartialUpdate, ServiceError>>,
{
    if !has_input {
        debug!("{}: no input, skipping", section.stage());
        return StageReport {
            section,
            outcome: StageOutcome::Skipped,
        };
    }

    let outcome = match stage.await {
        Ok(update) => StageOutcome::Updated(update),
        Err(e) => StageOutcome::Failed(e),
    };
    StageReport { section, outcome }
}

// ────────────────────────────────────────────────────────────────────────────
// Driver
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Orchestrator {
    client: GenerativeClient,
}

impl Orchestrator {
    pub fn new(client: GenerativeClient) -> Self {
        Self { client }
    }

    /// Handles one enhancement request. `cancel` is propagated into every service call.
    pub async fn run(
        &self,
        request: EnhanceRequest,
        cancel: &CancellationToken,
    ) -> Result<EnhanceResponse, OrchestrationError> {
        let (document, user_input, history) = request.into_parts()?;

        let intent = classify(&self.client, &user_input, &history, cancel)
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    OrchestrationError::Cancelled
                } else {
                    OrchestrationError::Classification(e)
                }
            })?;
        info!("Classified intent: {:?}", intent.kind);

        let context = match route(&intent) {
            Route::Reply(message) => {
                return Ok(EnhanceResponse {
                    updated_document: document,
                    message: message.to_string(),
                })
            }
            Route::Enhance(context) => context,
        };

        let reports = self.run_enhancers(&document, &context, cancel).await;
        if cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }

        let combined = combine(reports);
        if combined.is_empty() {
            info!("No stage produced changes; returning the document unchanged");
        }
        let updated_document = merge(&document, &combined);

        Ok(EnhanceResponse {
            updated_document,
            message: ENHANCEMENT_COMPLETE_MESSAGE.to_string(),
        })
    }

    /// Runs the three section enhancers concurrently. They share only the client (and
    /// through it the rate limiter); none sees another's output.
    pub async fn run_enhancers(
        &self,
        document: &ResumeDocument,
        context: &EnhancementContext,
        cancel: &CancellationToken,
    ) -> Vec<StageReport> {
        let client = &self.client;
        let (summary, projects, experiences) = tokio::join!(
            run_stage(
                Section::SummaryAndSkills,
                summary_skills::has_input(document),
                summary_skills::enhance(client, document, context, cancel),
            ),
            run_stage(
                Section::Projects,
                projects::has_input(document),
                projects::enhance(client, document, context, cancel),
            ),
            run_stage(
                Section::Experiences,
                experiences::has_input(document),
                experiences::enhance(client, document, context, cancel),
            ),
        );
        vec![summary, projects, experiences]
    }
}
