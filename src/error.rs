//! Error types for bqagent.

use thiserror::Error;

/// Library-level error type for bqagent operations.
#[derive(Error, Debug)]
pub enum BqAgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: String,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("BigQuery error ({status}): {message}")]
    BigQuery { status: u16, message: String },

    #[error("Query did not complete within {0} seconds")]
    QueryTimeout(u64),

    #[error("Read-only mode: {0}")]
    ReadOnly(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Model API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Agent error: {0}")]
    Agent(String),
}

/// Result type alias for bqagent operations.
pub type Result<T> = std::result::Result<T, BqAgentError>;
