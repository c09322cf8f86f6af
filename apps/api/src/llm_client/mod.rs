/// Generative client: the single point of entry for every call to the external
/// text-generation service.
///
/// ARCHITECTURAL RULE: No other module may talk to the service directly. The intent
/// classifier and every section enhancer go through `GenerativeClient::invoke`, which
/// owns pacing, retry/backoff, envelope unwrapping, fence stripping and JSON parsing.
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub mod prompts;
pub mod rate_limiter;
pub mod transport;

use rate_limiter::RateLimiter;
use transport::{BoxError, GenerateContentRequest, GenerateContentResponse, Transport};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Why one physical call failed.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("service returned no text content")]
    EmptyContent,

    #[error("call cancelled")]
    Cancelled,
}

impl CallError {
    /// 429, 5xx, transport failures, missing text and unparseable text are retried.
    /// Every other non-2xx status and cancellation fail the call immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            CallError::Transport(_) | CallError::Parse(_) | CallError::EmptyContent => true,
            CallError::Api { status, .. } => is_retryable_status(*status),
            CallError::Cancelled => false,
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// A call through `GenerativeClient::invoke` that did not produce a value.
#[derive(Debug, Error)]
#[error("{stage} failed after {attempts} attempt(s): {cause}")]
pub struct ServiceError {
    pub stage: String,
    pub attempts: u32,
    #[source]
    pub cause: CallError,
}

impl ServiceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, CallError::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, counting the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Backoff after the failed attempt with 0-based index `attempt`: base * 2^attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Shared client for the generative service. Cheap to clone; every clone shares the
/// same transport and the same process-wide `RateLimiter`.
#[derive(Clone)]
pub struct GenerativeClient {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl GenerativeClient {
    pub fn new(transport: Arc<dyn Transport>, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            limiter,
            policy,
        }
    }

    /// Calls the service with the client's default retry policy and parses the reply as `T`.
    /// `stage` names the caller in logs and in the returned error.
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        stage: &str,
        request: &GenerateContentRequest,
        cancel: &CancellationToken,
    ) -> Result<T, ServiceError> {
        self.invoke_with(stage, request, self.policy, cancel).await
    }

    pub async fn invoke_with<T: DeserializeOwned>(
        &self,
        stage: &str,
        request: &GenerateContentRequest,
        policy: RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<T, ServiceError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            let cause = match self.attempt(request, cancel).await {
                Ok(value) => {
                    attempts += 1;
                    debug!("{stage}: succeeded on attempt {attempts}");
                    return Ok(value);
                }
                Err(cause) => {
                    attempts += 1;
                    cause
                }
            };

            if !cause.is_retryable() {
                warn!("{stage}: attempt {attempts} failed with non-retryable error: {cause}");
                return Err(ServiceError {
                    stage: stage.to_string(),
                    attempts,
                    cause,
                });
            }

            if attempts >= max_attempts {
                warn!("{stage}: giving up after {attempts} attempts: {cause}");
                return Err(ServiceError {
                    stage: stage.to_string(),
                    attempts,
                    cause,
                });
            }

            let delay = policy.delay_for(attempts - 1);
            warn!(
                "{stage}: attempt {attempts}/{max_attempts} failed ({cause}), retrying after {}ms...",
                delay.as_millis()
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ServiceError {
                        stage: stage.to_string(),
                        attempts,
                        cause: CallError::Cancelled,
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One paced physical call, interpreted down to `T`.
    async fn attempt<T: DeserializeOwned>(
        &self,
        request: &GenerateContentRequest,
        cancel: &CancellationToken,
    ) -> Result<T, CallError> {
        if cancel.is_cancelled() {
            return Err(CallError::Cancelled);
        }

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CallError::Cancelled),
            raw = async {
                self.limiter.acquire().await;
                self.transport.send(request).await
            } => raw.map_err(CallError::Transport)?,
        };

        if is_retryable_status(raw.status) {
            return Err(CallError::Api {
                status: raw.status,
                message: raw.body,
            });
        }

        if !(200..300).contains(&raw.status) {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&raw.body)
                .map(|e| e.error.message)
                .unwrap_or(raw.body);
            return Err(CallError::Api {
                status: raw.status,
                message,
            });
        }

        let envelope: GenerateContentResponse = serde_json::from_str(&raw.body)?;
        if let Some(usage) = &envelope.usage_metadata {
            debug!(
                "Generative call succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        let text = envelope.text().ok_or(CallError::EmptyContent)?;
        parse_structured(&text)
    }
}

/// Parses model output as JSON, tolerating a markdown code fence around it.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, CallError> {
    serde_json::from_str(strip_json_fences(text)).map_err(CallError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```JSON"))
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    let rest = rest.trim_start();
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest)
}
