//! Configuration settings for bqagent.

use super::profile::ConnectionProfile;
use crate::error::{BqAgentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub agent: AgentSettings,
    pub bigquery: BigQuerySettings,
}

/// Chat model endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible API base (e.g. a LiteLLM proxy). None = api.openai.com.
    pub base_url: Option<String>,
    /// Model name passed to the chat completions endpoint.
    pub model: String,
    /// API key. Falls back to LLM_API_KEY, then OPENAI_API_KEY.
    pub api_key: Option<String>,
    /// Verify TLS certificates of the model endpoint.
    pub verify_ssl: bool,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            verify_ssl: true,
            timeout_secs: 300,
            temperature: 0.1,
        }
    }
}

impl LlmSettings {
    /// The API key from config, or OPENAI_API_KEY from the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

/// Agent definition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub name: String,
    pub description: String,
    /// Custom instruction template. Supports {{project_id}}, {{dataset_id}},
    /// {{table_name}}, {{table_id}}, {{location}} and {{dimensions}}.
    pub instruction: Option<String>,
    /// Maximum model calls per question.
    pub max_iterations: usize,
    /// Messages kept in interactive history.
    pub history_limit: usize,
    /// Extra variables available to the instruction template.
    pub variables: HashMap<String, String>,
}

pub const DEFAULT_AGENT_NAME: &str = "bigquery_agent";
/// Default cap on model calls per question.
pub const DEFAULT_MAX_ITERATIONS: usize = 15;
/// Default number of messages kept in history, system message included.
pub const DEFAULT_HISTORY_LIMIT: usize = 30;

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            description: "Natural-language analysis agent for BigQuery data".to_string(),
            instruction: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            variables: HashMap::new(),
        }
    }
}

/// Statement policy for `execute_sql`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Only SELECT statements may run.
    #[default]
    Blocked,
    /// Any statement may run.
    Allowed,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::Blocked => write!(f, "blocked"),
            WriteMode::Allowed => write!(f, "allowed"),
        }
    }
}

/// BigQuery connection and toolset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BigQuerySettings {
    pub project_id: String,
    pub dataset_id: String,
    pub table_name: String,
    pub location: String,
    /// BigQuery REST API base URL.
    pub api_base: String,
    pub write_mode: WriteMode,
    /// Maximum rows returned to the model per query.
    pub max_query_result_rows: u32,
    /// How long to wait for a query job before giving up.
    pub query_timeout_secs: u64,
    /// Path to an Application Default Credentials JSON file.
    pub credentials: Option<String>,
    /// Columns that may be used by `get_fraud_statistics`.
    pub dimensions: Vec<String>,
}

pub const DEFAULT_PROJECT_ID: &str = "your-gcp-project-id";
pub const DEFAULT_DATASET_ID: &str = "fraud_data";
pub const DEFAULT_TABLE_NAME: &str = "fraud_records";
pub const DEFAULT_LOCATION: &str = "US";

impl Default for BigQuerySettings {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            dataset_id: DEFAULT_DATASET_ID.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            api_base: "https://bigquery.googleapis.com/bigquery/v2/".to_string(),
            write_mode: WriteMode::Blocked,
            max_query_result_rows: 50,
            query_timeout_secs: 120,
            credentials: None,
            dimensions: [
                "gender",
                "age_bracket",
                "income_bracket",
                "education",
                "occupation",
                "company",
                "region",
                "fraud_type",
                "fraud_amount",
                "fraud_date",
                "fraud_id",
                "created_at",
                "updated_at",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Environment variables that override file settings.
pub const ENV_PROJECT_ID: &str = "FRAUD_PROJECT_ID";
pub const ENV_DATASET_ID: &str = "FRAUD_DATASET_ID";
pub const ENV_TABLE_NAME: &str = "FRAUD_TABLE_NAME";
pub const ENV_LOCATION: &str = "FRAUD_LOCATION";
pub const ENV_LLM_API_URL: &str = "LLM_API_URL";
pub const ENV_LLM_API_KEY: &str = "LLM_API_KEY";
pub const ENV_MODEL_NAME: &str = "MODEL_NAME";

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or the default location if None,
    /// then apply environment overrides.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => {
                let p = Self::expand_path(&p.to_string_lossy());
                if !p.exists() {
                    return Err(BqAgentError::Config(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                Self::from_file(&p)?
            }
            None => {
                let p = Self::default_config_path();
                if p.exists() {
                    Self::from_file(&p)?
                } else {
                    debug!("No config file at {}, using defaults", p.display());
                    Settings::default()
                }
            }
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Parse a configuration file without applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::parse(&content, ConfigFormat::from_path(path))?;
        debug!("Configuration loaded from {}", path.display());
        Ok(settings)
    }

    fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }
        match format {
            ConfigFormat::Yaml => Ok(serde_yaml::from_str(content)?),
            ConfigFormat::Toml => Ok(toml::from_str(content)?),
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using the given variable lookup. Empty values are ignored.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_PROJECT_ID) {
            self.bigquery.project_id = v;
        }
        if let Some(v) = get(ENV_DATASET_ID) {
            self.bigquery.dataset_id = v;
        }
        if let Some(v) = get(ENV_TABLE_NAME) {
            self.bigquery.table_name = v;
        }
        if let Some(v) = get(ENV_LOCATION) {
            self.bigquery.location = v;
        }
        if let Some(v) = get(ENV_LLM_API_URL) {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = get(ENV_LLM_API_KEY) {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get(ENV_MODEL_NAME) {
            self.llm.model = v;
        }
    }

    /// Build and validate the connection profile.
    pub fn profile(&self) -> Result<ConnectionProfile> {
        ConnectionProfile::new(
            &self.bigquery.project_id,
            &self.bigquery.dataset_id,
            &self.bigquery.table_name,
            &self.bigquery.location,
        )
    }

    /// Save settings to a specific path. The extension picks the format.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_string_for(path)?)?;
        Ok(())
    }

    /// Serialize for display or saving, in the format implied by `path`.
    pub fn to_string_for(&self, path: &Path) -> Result<String> {
        match ConfigFormat::from_path(path) {
            ConfigFormat::Yaml => Ok(serde_yaml::to_string(self)?),
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| BqAgentError::Config(e.to_string()))
            }
        }
    }

    /// `./config.yaml` when present, otherwise the per-user config file.
    pub fn default_config_path() -> PathBuf {
        let local = PathBuf::from("config.yaml");
        if local.exists() {
            local
        } else {
            Self::user_config_path()
        }
    }

    /// Per-user configuration file path.
    pub fn user_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bqagent")
            .join("config.yaml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Expanded path to the configured credentials file, if any.
    pub fn credentials_path(&self) -> Option<PathBuf> {
        self.bigquery
            .credentials
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(Self::expand_path)
    }
}
