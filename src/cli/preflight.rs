//! Pre-flight checks before talking to the model or BigQuery.
//!
//! Catches missing configuration up front so failures come with a hint
//! instead of an opaque API error halfway through a question.

use crate::bigquery::CredentialSource;
use crate::config::{Settings, ENV_LLM_API_KEY};
use crate::error::{BqAgentError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Questions need the model and BigQuery.
    Ask,
    /// Direct SQL needs BigQuery only.
    Query,
}

/// Run pre-flight checks for the given operation.
///
/// Returns the discovered credential source when all checks pass.
pub fn check(operation: Operation, settings: &Settings) -> Result<CredentialSource> {
    if let Operation::Ask = operation {
        check_api_key(settings)?;
    }
    settings.profile()?;
    CredentialSource::discover(settings.credentials_path().as_deref())
}

/// A key is required unless a custom endpoint is configured, which may not
/// need one.
fn check_api_key(settings: &Settings) -> Result<()> {
    let custom_endpoint = settings
        .llm
        .base_url
        .as_deref()
        .is_some_and(|u| !u.is_empty());
    if settings.llm.resolved_api_key().is_some() || custom_endpoint {
        return Ok(());
    }
    Err(BqAgentError::Config(format!(
        "No model API key. Set it with: export {}='sk-...' (or OPENAI_API_KEY)",
        ENV_LLM_API_KEY
    )))
}
