//! OpenAI-compatible client configuration.
//!
//! Works against api.openai.com or any compatible endpoint such as a LiteLLM
//! proxy, selected with `llm.base_url`.

use crate::config::LlmSettings;
use crate::error::Result;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;
use tracing::warn;

/// Create a chat client from the model settings.
pub fn create_client(settings: &LlmSettings) -> Result<Client<OpenAIConfig>> {
    let mut builder =
        reqwest::Client::builder().timeout(Duration::from_secs(settings.timeout_secs));
    if !settings.verify_ssl {
        warn!("TLS certificate verification is disabled for the model endpoint");
        builder = builder.danger_accept_invalid_certs(true);
    }
    let http_client = builder.build()?;

    Ok(Client::with_config(client_config(settings)).with_http_client(http_client))
}

fn client_config(settings: &LlmSettings) -> OpenAIConfig {
    let mut config = OpenAIConfig::default();
    if let Some(base) = settings.base_url.as_deref().filter(|b| !b.is_empty()) {
        config = config.with_api_base(base.trim_end_matches('/'));
    }
    if let Some(key) = settings.resolved_api_key() {
        config = config.with_api_key(key);
    }
    config
}
