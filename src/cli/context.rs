//! Wiring settings into a client, toolset and agent.

use crate::agent::{Agent, BigQueryToolset, ChatModel, OpenAIChatModel, ToolSettings};
use crate::bigquery::{BigQueryClient, CredentialSource, Warehouse};
use crate::config::prompts::agent_instruction;
use crate::config::Settings;
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// Connect to BigQuery with the given credentials.
pub fn connect(settings: &Settings, credentials: CredentialSource) -> Result<Arc<dyn Warehouse>> {
    info!("BigQuery credentials: {}", credentials.describe());
    Ok(Arc::new(BigQueryClient::new(&settings.bigquery, credentials)?))
}

/// Build a toolset scoped to the configured profile.
///
/// SQL generation tools are enabled when a model is given.
pub fn build_toolset(
    settings: &Settings,
    warehouse: Arc<dyn Warehouse>,
    sql_model: Option<Arc<dyn ChatModel>>,
) -> Result<BigQueryToolset> {
    let profile = settings.profile()?;
    let toolset = BigQueryToolset::new(warehouse, profile, ToolSettings::from(&settings.bigquery));
    Ok(match sql_model {
        Some(model) => toolset.with_sql_model(model),
        None => toolset,
    })
}

/// Build the agent: one model serves both the loop and SQL generation.
pub fn build_agent(
    settings: &Settings,
    warehouse: Arc<dyn Warehouse>,
    model: Option<Arc<dyn ChatModel>>,
) -> Result<Agent> {
    let model: Arc<dyn ChatModel> = match model {
        Some(m) => m,
        None => Arc::new(OpenAIChatModel::new(&settings.llm)?),
    };
    let toolset = build_toolset(settings, warehouse, Some(model.clone()))?;
    let instruction = agent_instruction(toolset.profile(), &settings.bigquery, &settings.agent);

    info!(
        "Agent '{}' using model {} on {}",
        settings.agent.name,
        model.name(),
        toolset.profile()
    );

    Ok(Agent::new(model, toolset, &instruction)
        .with_name(&settings.agent.name)
        .with_max_iterations(settings.agent.max_iterations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeWarehouse, ScriptedModel};

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.apply_env_overrides_from(|key| match key {
            "FRAUD_PROJECT_ID" => Some("acme-analytics".to_string()),
            "FRAUD_TABLE_NAME" => Some("cases_2024".to_string()),
            _ => None,
        });
        settings
    }

    #[test]
    fn test_agent_scoped_to_profile() {
        let model: Arc<dyn ChatModel> = Arc::new(ScriptedModel::new(vec![]));
        let agent =
            build_agent(&settings(), Arc::new(FakeWarehouse::default()), Some(model)).unwrap();

        let profile = agent.tools().profile();
        assert_eq!(profile.project_id(), "acme-analytics");
        assert_eq!(profile.dataset_id(), "fraud_data");
        assert_eq!(profile.table_name(), "cases_2024");
        assert!(agent.instruction().contains("`acme-analytics.fraud_data.cases_2024`"));
        assert_eq!(agent.tools().tool_names().len(), 8);
        assert_eq!(agent.model_name(), "scripted");
    }

    #[test]
    fn test_toolset_without_model() {
        let toolset = build_toolset(&settings(), Arc::new(FakeWarehouse::default()), None).unwrap();
        assert!(!toolset.tool_names().contains(&"analyze_fraud_patterns"));
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let mut settings = settings();
        settings.bigquery.location = "not a location".to_string();
        assert!(build_toolset(&settings, Arc::new(FakeWarehouse::default()), None).is_err());
    }
}
