//! OpenAI-compatible client configuration.
//!
//! The same client type talks to OpenAI or to any compatible endpoint
//! (Groq, local inference servers) by overriding the API base.

use crate::error::{Result, SporError};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Environment variable holding the default API key.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Create an OpenAI client with the default timeout and endpoint.
pub fn create_client() -> Result<Client<OpenAIConfig>> {
    create_client_with(None, DEFAULT_API_KEY_ENV, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client for a specific endpoint, key variable and transport timeout.
pub fn create_client_with(
    api_base: Option<&str>,
    api_key_env: &str,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SporError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = api_base.filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }
    if api_key_env != DEFAULT_API_KEY_ENV {
        if let Ok(key) = std::env::var(api_key_env) {
            config = config.with_api_key(key);
        }
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}
