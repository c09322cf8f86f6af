use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{rate_limiter, transport, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub llm_min_spacing: Duration,
    pub llm_max_attempts: u32,
    pub llm_base_delay: Duration,
    pub enhance_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_model: env_or("GEMINI_MODEL", DEFAULT_MODEL.to_string())?,
            gemini_base_url: env_or("GEMINI_BASE_URL", transport::DEFAULT_BASE_URL.to_string())?,
            llm_min_spacing: Duration::from_millis(env_or(
                "LLM_MIN_SPACING_MS",
                rate_limiter::DEFAULT_MIN_SPACING.as_millis() as u64,
            )?),
            llm_max_attempts: env_or("LLM_MAX_RETRIES", DEFAULT_MAX_ATTEMPTS)?,
            llm_base_delay: Duration::from_millis(env_or(
                "LLM_BASE_DELAY_MS",
                DEFAULT_BASE_DELAY.as_millis() as u64,
            )?),
            enhance_timeout: Duration::from_secs(env_or("ENHANCE_TIMEOUT_SECS", 120)?),
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/resume_enhancer_test".to_string(),
            gemini_api_key: "test-key".to_string(),
            gemini_model: DEFAULT_MODEL.to_string(),
            gemini_base_url: transport::DEFAULT_BASE_URL.to_string(),
            llm_min_spacing: rate_limiter::DEFAULT_MIN_SPACING,
            llm_max_attempts: DEFAULT_MAX_ATTEMPTS,
            llm_base_delay: DEFAULT_BASE_DELAY,
            enhance_timeout: Duration::from_secs(120),
            port: 8080,
            rust_log: "debug".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}
