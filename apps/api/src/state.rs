use std::sync::Arc;

use crate::config::Config;
use crate::db::ResumeRepository;
use crate::enhancement::orchestrator::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResumeRepository>,
    /// Owns the single `GenerativeClient`, and through it the process-wide rate limiter.
    pub orchestrator: Orchestrator,
    pub config: Config,
}
