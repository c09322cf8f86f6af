//! Axum route handlers for the Enhancement API and the resume document store.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::enhancement::orchestrator::{EnhanceRequest, EnhanceResponse};
use crate::errors::{AppError, AppJson};
use crate::models::conversation::ConversationMessage;
use crate::models::resume::ResumeDocument;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// Body for enhancing a stored resume; the document comes from the store.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEnhanceRequest {
    pub user_input: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<ConversationMessage>,
}

/// Runs one orchestration under a cancellation token and the configured deadline.
/// Dropping this future (client disconnect) cancels every in-flight service call.
async fn run_orchestration(
    state: &AppState,
    request: EnhanceRequest,
) -> Result<EnhanceResponse, AppError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match tokio::time::timeout(
        state.config.enhance_timeout,
        state.orchestrator.run(request, &cancel),
    )
    .await
    {
        Ok(result) => Ok(result?),
        Err(_) => {
            cancel.cancel();
            Err(AppError::Timeout(format!(
                "Enhancement did not finish within {}s",
                state.config.enhance_timeout.as_secs()
            )))
        }
    }
}

/// POST /api/v1/enhance
///
/// Stateless: the caller sends the document, the instruction and the transcript, and
/// gets back the (possibly) updated document plus a reply message.
pub async fn handle_enhance(
    State(state): State<AppState>,
    AppJson(request): AppJson<EnhanceRequest>,
) -> Result<Json<EnhanceResponse>, AppError> {
    let response = run_orchestration(&state, request).await?;
    Ok(Json(response))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ResumeDocument>, AppError> {
    let stored = state
        .store
        .load(params.user_id, resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;
    Ok(Json(stored.document))
}

/// PUT /api/v1/resumes/:id
pub async fn handle_put_resume(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    AppJson(document): AppJson<ResumeDocument>,
) -> Result<StatusCode, AppError> {
    if !state.store.save(params.user_id, resume_id, &document).await? {
        return Err(AppError::NotFound(format!("Resume {resume_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/resumes/:id/enhance
///
/// Loads the stored document, runs the orchestration, and saves the result when it
/// differs from what was stored. The save only lands if nobody wrote the resume while
/// the enhancement was running; otherwise the caller gets a 409 and nothing is saved.
pub async fn handle_enhance_stored(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    AppJson(request): AppJson<StoredEnhanceRequest>,
) -> Result<Json<EnhanceResponse>, AppError> {
    let stored = state
        .store
        .load(params.user_id, resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;

    let response = run_orchestration(
        &state,
        EnhanceRequest {
            document: Some(stored.document.clone()),
            user_input: request.user_input,
            chat_history: request.chat_history,
        },
    )
    .await?;

    if response.updated_document != stored.document {
        let saved = state
            .store
            .save_if_unchanged(
                params.user_id,
                resume_id,
                &response.updated_document,
                stored.version,
            )
            .await?;
        if !saved {
            warn!("Resume {resume_id} changed during enhancement; result discarded");
            return Err(AppError::Conflict(format!(
                "Resume {resume_id} was modified while it was being enhanced; reload and try again"
            )));
        }
        info!("Saved enhanced resume {resume_id} for user {}", params.user_id);
    }

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::Config;
    use crate::db::testing::InMemoryResumeStore;
    use crate::enhancement::orchestrator::{Orchestrator, ENHANCEMENT_COMPLETE_MESSAGE, GREETING_MESSAGE};
    use crate::llm_client::rate_limiter::RateLimiter;
    use crate::llm_client::transport::testing::{Reply, ScriptedTransport};
    use crate::llm_client::{GenerativeClient, RetryPolicy};
    use crate::models::resume::ResumeDocument;
    use crate::routes::build_router;
    use crate::state::AppState;

    const CLASSIFY: &str = "TASK: CLASSIFY RESUME ASSISTANT INTENT";
    const EXPERIENCES: &str = "TASK: ENHANCE EXPERIENCE DESCRIPTIONS";

    fn test_state(transport: Arc<ScriptedTransport>, store: Arc<InMemoryResumeStore>) -> AppState {
        let client = GenerativeClient::new(
            transport,
            Arc::new(RateLimiter::default()),
            RetryPolicy::default(),
        );
        AppState {
            store,
            orchestrator: Orchestrator::new(client),
            config: Config::for_tests(),
        }
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        if bytes.is_empty() {
            return (status, Value::Null);
        }
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_enhance(state: AppState, body: Value) -> (StatusCode, Value) {
        send(state, json_request(Method::POST, "/api/v1/enhance", body)).await
    }

    fn document() -> Value {
        json!({
            "personalInfo": {"summary": "Engineer", "email": "sam@example.com"},
            "skillCategories": [],
            "projects": [],
            "experiences": [{"id": "e1", "description": "worked on backend"}]
        })
    }

    fn stored_document() -> ResumeDocument {
        serde_json::from_value(document()).unwrap()
    }

    fn profession_reply() -> Reply {
        Reply::json(&json!({"intent": "PROVIDE_PROFESSION", "profession": "Backend Engineer"}))
    }

    fn experience_reply() -> Reply {
        Reply::json(&json!({"experiences": [{
            "id": "e1",
            "description": "Rebuilt the order service in Rust, cutting p99 latency 40%"
        }]}))
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_user_input_is_bad_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(InMemoryResumeStore::new());
        let (status, body) =
            post_enhance(test_state(transport.clone(), store), json!({"document": document()})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "userInput is required");
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_document_is_bad_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(InMemoryResumeStore::new());
        let (status, body) =
            post_enhance(test_state(transport, store), json!({"userInput": "hello"})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "document is required");
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_document_uses_error_body() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(InMemoryResumeStore::new());
        let (status, body) = post_enhance(
            test_state(transport.clone(), store),
            json!({"document": "not a resume", "userInput": "hello"}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["error"].as_str().unwrap().contains("document"));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversation_returns_greeting_and_same_document() {
        let transport = Arc::new(
            ScriptedTransport::new().on(CLASSIFY, vec![Reply::json(&json!({"intent": "CONVERSATION"}))]),
        );
        let store = Arc::new(InMemoryResumeStore::new());
        let (status, body) = post_enhance(
            test_state(transport, store),
            json!({
                "document": document(),
                "userInput": "hi!",
                "chatHistory": [{"role": "assistant", "text": "Welcome"}]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], GREETING_MESSAGE);
        assert_eq!(body["updatedDocument"], document());
    }

    #[tokio::test(start_paused = true)]
    async fn test_classification_failure_is_server_error() {
        let transport = Arc::new(ScriptedTransport::new().on(CLASSIFY, vec![Reply::status(503)]));
        let store = Arc::new(InMemoryResumeStore::new());
        let (status, body) = post_enhance(
            test_state(transport.clone(), store),
            json!({"document": document(), "userInput": "Backend Engineer"}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("Intent classification"));
        assert_eq!(body["code"], "CLASSIFICATION_ERROR");
        assert_eq!(transport.calls(CLASSIFY), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_returns_gateway_timeout() {
        let transport = Arc::new(ScriptedTransport::new().on(CLASSIFY, vec![Reply::status(503)]));
        let store = Arc::new(InMemoryResumeStore::new());
        let mut state = test_state(transport, store);
        state.config.enhance_timeout = Duration::from_millis(500);

        let (status, body) = post_enhance(
            state,
            json!({"document": document(), "userInput": "Backend Engineer"}),
        )
        .await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["code"], "TIMEOUT");
    }

    #[tokio::test]
    async fn test_resume_of_another_user_is_not_found() {
        let (owner, intruder, resume_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let store = Arc::new(InMemoryResumeStore::new().with_resume(owner, resume_id, stored_document()));
        let state = test_state(Arc::new(ScriptedTransport::new()), store.clone());
        let uri = format!("/api/v1/resumes/{resume_id}?user_id={intruder}");

        let (status, body) = send(
            state.clone(),
            Request::get(uri.as_str()).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, _) = send(state, json_request(Method::PUT, &uri, json!({"projects": []}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(store.document(resume_id), Some(stored_document()));
        assert_eq!(store.version(resume_id), Some(1));
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips_document() {
        let (owner, resume_id) = (Uuid::new_v4(), Uuid::new_v4());
        let store = Arc::new(InMemoryResumeStore::new());
        let state = test_state(Arc::new(ScriptedTransport::new()), store);
        let uri = format!("/api/v1/resumes/{resume_id}?user_id={owner}");

        let (status, _) = send(state.clone(), json_request(Method::PUT, &uri, document())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) =
            send(state, Request::get(uri.as_str()).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, document());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stored_enhancement_saves_changed_document() {
        let (owner, resume_id) = (Uuid::new_v4(), Uuid::new_v4());
        let store = Arc::new(InMemoryResumeStore::new().with_resume(owner, resume_id, stored_document()));
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(CLASSIFY, vec![profession_reply()])
                .on(EXPERIENCES, vec![experience_reply()]),
        );

        let (status, body) = send(
            test_state(transport, store.clone()),
            json_request(
                Method::POST,
                &format!("/api/v1/resumes/{resume_id}/enhance?user_id={owner}"),
                json!({"userInput": "Backend Engineer"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], ENHANCEMENT_COMPLETE_MESSAGE);
        let saved = store.document(resume_id).unwrap();
        assert_eq!(
            saved.experiences[0].description,
            "Rebuilt the order service in Rust, cutting p99 latency 40%"
        );
        assert_eq!(saved.personal_info.extra["email"], "sam@example.com");
        assert_eq!(store.version(resume_id), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stored_enhancement_skips_save_when_unchanged() {
        let (owner, resume_id) = (Uuid::new_v4(), Uuid::new_v4());
        let store = Arc::new(InMemoryResumeStore::new().with_resume(owner, resume_id, stored_document()));
        let transport = Arc::new(
            ScriptedTransport::new().on(CLASSIFY, vec![Reply::json(&json!({"intent": "CONVERSATION"}))]),
        );

        let (status, body) = send(
            test_state(transport, store.clone()),
            json_request(
                Method::POST,
                &format!("/api/v1/resumes/{resume_id}/enhance?user_id={owner}"),
                json!({"userInput": "hello"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], GREETING_MESSAGE);
        assert_eq!(store.version(resume_id), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_enhancement_is_not_overwritten() {
        let (owner, resume_id) = (Uuid::new_v4(), Uuid::new_v4());
        let store = Arc::new(InMemoryResumeStore::new().with_resume(owner, resume_id, stored_document()));
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(CLASSIFY, vec![Reply::status(503), profession_reply()])
                .on(EXPERIENCES, vec![experience_reply()]),
        );
        let state = test_state(transport.clone(), store.clone());

        // The first classification attempt fails, leaving the enhancement in backoff.
        let enhancing = tokio::spawn(send(
            state.clone(),
            json_request(
                Method::POST,
                &format!("/api/v1/resumes/{resume_id}/enhance?user_id={owner}"),
                json!({"userInput": "Backend Engineer"}),
            ),
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.calls(CLASSIFY), 1);

        let mut edited = document();
        edited["personalInfo"]["summary"] = json!("Edited by hand");
        let (status, _) = send(
            state,
            json_request(
                Method::PUT,
                &format!("/api/v1/resumes/{resume_id}?user_id={owner}"),
                edited,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = enhancing.await.unwrap();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let saved = store.document(resume_id).unwrap();
        assert_eq!(saved.personal_info.summary, "Edited by hand");
        assert_eq!(saved.experiences[0].description, "worked on backend");
        assert_eq!(store.version(resume_id), Some(2));
    }
}
