//! Configuration module for bqagent.
//!
//! Handles loading settings, building the connection profile and rendering
//! prompt templates.

pub mod prompts;
mod profile;
mod settings;

pub use profile::{
    validate_dataset_id, validate_location, validate_project_id, validate_table_name,
    ConnectionProfile,
};
pub use settings::{
    AgentSettings, BigQuerySettings, LlmSettings, Settings, WriteMode, DEFAULT_AGENT_NAME,
    DEFAULT_DATASET_ID, DEFAULT_HISTORY_LIMIT, DEFAULT_LOCATION, DEFAULT_MAX_ITERATIONS,
    DEFAULT_PROJECT_ID, DEFAULT_TABLE_NAME, ENV_DATASET_ID, ENV_LLM_API_KEY, ENV_LLM_API_URL,
    ENV_LOCATION, ENV_MODEL_NAME, ENV_PROJECT_ID, ENV_TABLE_NAME,
};
