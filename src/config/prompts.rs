//! Prompt templates for bqagent.
//!
//! Templates use `{{variable}}` placeholders that are filled from the
//! connection profile and any custom variables in the agent settings.

use super::profile::ConnectionProfile;
use super::settings::{AgentSettings, BigQuerySettings};
use std::collections::HashMap;

/// Default agent instruction.
pub const DEFAULT_INSTRUCTION: &str = r#"You are an expert BigQuery data analyst with access to BigQuery tools.

Your configuration:
- Project ID: {{project_id}}
- Default dataset: {{dataset_id}}
- Default table: {{table_id}}
- Location: {{location}}

Known columns of the default table: {{dimensions}}

Tools:
- 'get_table_metadata' returns a table's schema, row count and description. Use it before writing SQL for an unfamiliar table.
- 'list_tables' and 'get_dataset_info' show what is available in a dataset.
- 'execute_sql' runs a GoogleSQL (standard SQL) query. Always reference tables fully qualified with backticks, e.g. `{{table_id}}`.
- 'get_query_results' fetches more rows of a previous query by job id and page token.
- 'get_fraud_statistics' returns counts grouped by one known column, or overall counts.
- 'generate_query' and 'analyze_fraud_patterns' draft (and run) SQL from a plain-language request.

Guidelines:
- Use GROUP BY for aggregations and order results logically.
- Use LIMIT 100 or less for large result sets.
- When a tool returns an error, explain it plainly and suggest how to fix it.
- Explain findings clearly with relevant statistics and percentages.
- Show the SQL you ran when it helps the user."#;

/// System prompt for one-off SQL generation.
pub const SQL_GENERATION_SYSTEM: &str =
    "You are a SQL expert. Generate BigQuery SQL queries for data analysis.";

/// User prompt for one-off SQL generation.
pub const SQL_GENERATION_USER: &str = r#"Generate a BigQuery SQL query based on the user's request.

Table: {{table_id}}
Available columns: {{dimensions}}

User request: {{request}}

Generate a query that:
1. Uses GoogleSQL syntax and references the table as `{{table_id}}`
2. Includes appropriate WHERE clauses if needed
3. Uses GROUP BY for aggregations
4. Orders results logically
5. Limits results to reasonable numbers (LIMIT 100 for large result sets)

Return ONLY the SQL query, no explanations."#;

/// Template variables derived from the profile and settings.
pub fn profile_variables(
    profile: &ConnectionProfile,
    bigquery: &BigQuerySettings,
    agent: &AgentSettings,
) -> HashMap<String, String> {
    let mut vars = agent.variables.clone();
    vars.insert("project_id".to_string(), profile.project_id().to_string());
    vars.insert("dataset_id".to_string(), profile.dataset_id().to_string());
    vars.insert("table_name".to_string(), profile.table_name().to_string());
    vars.insert("table_id".to_string(), profile.table_id());
    vars.insert("location".to_string(), profile.location().to_string());
    vars.insert("dimensions".to_string(), bigquery.dimensions.join(", "));
    vars
}

/// The agent instruction, custom or default, rendered for this profile.
pub fn agent_instruction(
    profile: &ConnectionProfile,
    bigquery: &BigQuerySettings,
    agent: &AgentSettings,
) -> String {
    let template = agent.instruction.as_deref().unwrap_or(DEFAULT_INSTRUCTION);
    render(template, &profile_variables(profile, bigquery, agent))
}

/// Render a prompt template with the given variables.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        assert_eq!(render(template, &vars), "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_default_instruction_mentions_profile() {
        let profile =
            ConnectionProfile::new("acme-analytics", "fraud_data", "cases", "EU").unwrap();
        let text = agent_instruction(
            &profile,
            &BigQuerySettings::default(),
            &AgentSettings::default(),
        );
        assert!(text.contains("`acme-analytics.fraud_data.cases`"));
        assert!(text.contains("Location: EU"));
        assert!(text.contains("age_bracket"));
        assert!(!text.contains("{{"));
    }

    #[test]
    fn test_custom_instruction_and_variables() {
        let profile = ConnectionProfile::new("acme-analytics", "ds", "t", "US").unwrap();
        let mut agent = AgentSettings::default();
        agent.instruction = Some("Team {{team}} on {{table_id}}".to_string());
        agent.variables.insert("team".to_string(), "risk".to_string());
        // Profile values win over custom variables with the same name
        agent.variables.insert("table_id".to_string(), "spoofed".to_string());

        let text = agent_instruction(&profile, &BigQuerySettings::default(), &agent);
        assert_eq!(text, "Team risk on acme-analytics.ds.t");
    }
}
