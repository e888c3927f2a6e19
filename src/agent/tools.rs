//! BigQuery toolset exposed to the agent.

use super::model::ChatModel;
use super::sql;
use crate::bigquery::{DatasetRef, JobRef, QueryRequest, QueryResult, TableRef, Warehouse};
use crate::config::prompts::{self, SQL_GENERATION_SYSTEM, SQL_GENERATION_USER};
use crate::config::{
    validate_dataset_id, validate_location, validate_project_id, validate_table_name,
    BigQuerySettings, ConnectionProfile, WriteMode,
};
use crate::error::{BqAgentError, Result};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolType,
    FunctionObject,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Available tools for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    /// Run a GoogleSQL query.
    ExecuteSql { query: String },

    /// Get table schema and metadata.
    GetTableMetadata {
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        dataset_id: Option<String>,
        #[serde(default)]
        table_id: Option<String>,
    },

    /// List tables in a dataset.
    ListTables {
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        dataset_id: Option<String>,
    },

    /// Fetch rows of an earlier query job.
    GetQueryResults {
        job_id: String,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        location: Option<String>,
        #[serde(default)]
        page_token: Option<String>,
        #[serde(default)]
        max_results: Option<u32>,
    },

    /// Dataset metadata plus its tables.
    GetDatasetInfo {
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        dataset_id: Option<String>,
    },

    /// Counts grouped by one dimension, or overall counts.
    GetFraudStatistics {
        #[serde(default)]
        dimension: Option<String>,
    },

    /// Draft SQL for a plain-language request.
    GenerateQuery { request: String },

    /// Draft and run SQL for an analysis type.
    AnalyzeFraudPatterns {
        analysis_type: String,
        #[serde(default)]
        filters: Option<String>,
    },
}

/// Names of every tool, in the order they are offered.
pub const TOOL_NAMES: [&str; 8] = [
    "execute_sql",
    "get_table_metadata",
    "list_tables",
    "get_query_results",
    "get_dataset_info",
    "get_fraud_statistics",
    "generate_query",
    "analyze_fraud_patterns",
];

/// Tools that need a model for SQL generation.
const GENERATION_TOOLS: [&str; 2] = ["generate_query", "analyze_fraud_patterns"];

impl ToolCall {
    /// Tool name as exposed to the model.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ExecuteSql { .. } => "execute_sql",
            ToolCall::GetTableMetadata { .. } => "get_table_metadata",
            ToolCall::ListTables { .. } => "list_tables",
            ToolCall::GetQueryResults { .. } => "get_query_results",
            ToolCall::GetDatasetInfo { .. } => "get_dataset_info",
            ToolCall::GetFraudStatistics { .. } => "get_fraud_statistics",
            ToolCall::GenerateQuery { .. } => "generate_query",
            ToolCall::AnalyzeFraudPatterns { .. } => "analyze_fraud_patterns",
        }
    }
}

/// Parse a tool call from the OpenAI response format.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    if !TOOL_NAMES.contains(&name) {
        return Err(BqAgentError::Agent(format!("Unknown tool: {}", name)));
    }

    let args: Value = if arguments.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(arguments)
            .map_err(|e| BqAgentError::Agent(format!("Invalid tool arguments: {}", e)))?
    };
    if !args.is_object() {
        return Err(BqAgentError::Agent(
            "Tool arguments must be a JSON object".to_string(),
        ));
    }

    serde_json::from_value(json!({ "name": name, "arguments": args }))
        .map_err(|e| BqAgentError::Agent(format!("Invalid arguments for {}: {}", name, e)))
}

/// Tool output for a failed call, returned to the model verbatim.
pub fn error_output(error: &BqAgentError) -> String {
    pretty(&json!({ "success": false, "error": error.to_string() }))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Merge `fields` into a `{"success": true}` object.
fn success<T: Serialize>(fields: &T) -> Result<Value> {
    let mut out = serde_json::Map::new();
    out.insert("success".to_string(), Value::Bool(true));
    match serde_json::to_value(fields)? {
        Value::Object(map) => out.extend(map),
        other => {
            out.insert("result".to_string(), other);
        }
    }
    Ok(Value::Object(out))
}

/// Toolset limits and policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    pub write_mode: WriteMode,
    pub max_rows: u32,
    pub dimensions: Vec<String>,
}

impl From<&BigQuerySettings> for ToolSettings {
    fn from(settings: &BigQuerySettings) -> Self {
        Self {
            write_mode: settings.write_mode,
            max_rows: settings.max_query_result_rows.max(1),
            dimensions: settings.dimensions.clone(),
        }
    }
}

/// BigQuery tools scoped to one connection profile.
pub struct BigQueryToolset {
    warehouse: Arc<dyn Warehouse>,
    profile: ConnectionProfile,
    settings: ToolSettings,
    sql_model: Option<Arc<dyn ChatModel>>,
}

impl BigQueryToolset {
    /// Create a toolset for the given profile.
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        profile: ConnectionProfile,
        settings: ToolSettings,
    ) -> Self {
        Self {
            warehouse,
            profile,
            settings,
            sql_model: None,
        }
    }

    /// Enable `generate_query` and `analyze_fraud_patterns` with this model.
    pub fn with_sql_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.sql_model = Some(model);
        self
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// The profile's dataset.
    pub fn default_dataset(&self) -> DatasetRef {
        DatasetRef::new(self.profile.project_id(), self.profile.dataset_id())
    }

    /// The profile's table.
    pub fn default_table(&self) -> TableRef {
        TableRef::new(
            self.profile.project_id(),
            self.profile.dataset_id(),
            self.profile.table_name(),
        )
    }

    /// Names of the tools this toolset offers.
    pub fn tool_names(&self) -> Vec<&'static str> {
        TOOL_NAMES
            .iter()
            .copied()
            .filter(|name| self.sql_model.is_some() || !GENERATION_TOOLS.contains(name))
            .collect()
    }

    /// Function definitions for the tools this toolset offers.
    pub fn definitions(&self) -> Vec<ChatCompletionTool> {
        let offered = self.tool_names();
        tool_definitions()
            .into_iter()
            .filter(|t| offered.contains(&t.function.name.as_str()))
            .collect()
    }

    /// Execute a tool call and return its JSON output.
    pub async fn execute(&self, tool: &ToolCall) -> Result<String> {
        debug!("Running tool {}", tool.name());
        let output = match tool {
            ToolCall::ExecuteSql { query } => self.execute_sql(query).await?,
            ToolCall::GetTableMetadata {
                project_id,
                dataset_id,
                table_id,
            } => {
                let table = self.resolve_table(
                    project_id.as_deref(),
                    dataset_id.as_deref(),
                    table_id.as_deref(),
                )?;
                self.get_table_metadata(&table).await?
            }
            ToolCall::ListTables {
                project_id,
                dataset_id,
            } => {
                let dataset = self.resolve_dataset(project_id.as_deref(), dataset_id.as_deref())?;
                self.list_tables(&dataset).await?
            }
            ToolCall::GetQueryResults {
                job_id,
                project_id,
                location,
                page_token,
                max_results,
            } => {
                let job = self.resolve_job(job_id, project_id.as_deref(), location.as_deref())?;
                self.get_query_results(&job, page_token.as_deref(), *max_results)
                    .await?
            }
            ToolCall::GetDatasetInfo {
                project_id,
                dataset_id,
            } => {
                let dataset = self.resolve_dataset(project_id.as_deref(), dataset_id.as_deref())?;
                self.get_dataset_info(&dataset).await?
            }
            ToolCall::GetFraudStatistics { dimension } => {
                self.get_fraud_statistics(dimension.as_deref()).await?
            }
            ToolCall::GenerateQuery { request } => self.generate_query(request).await?,
            ToolCall::AnalyzeFraudPatterns {
                analysis_type,
                filters,
            } => {
                self.analyze_fraud_patterns(analysis_type, filters.as_deref())
                    .await?
            }
        };
        Ok(pretty(&output))
    }

    fn resolve_dataset(
        &self,
        project_id: Option<&str>,
        dataset_id: Option<&str>,
    ) -> Result<DatasetRef> {
        let project_id = non_empty(project_id).unwrap_or(self.profile.project_id());
        let dataset_id = non_empty(dataset_id).unwrap_or(self.profile.dataset_id());
        validate_project_id(project_id)?;
        validate_dataset_id(dataset_id)?;
        Ok(DatasetRef::new(project_id, dataset_id))
    }

    fn resolve_table(
        &self,
        project_id: Option<&str>,
        dataset_id: Option<&str>,
        table_id: Option<&str>,
    ) -> Result<TableRef> {
        let dataset = self.resolve_dataset(project_id, dataset_id)?;
        let table_id = non_empty(table_id).unwrap_or(self.profile.table_name());
        validate_table_name(table_id)?;
        Ok(TableRef::new(&dataset.project_id, &dataset.dataset_id, table_id))
    }

    fn resolve_job(
        &self,
        job_id: &str,
        project_id: Option<&str>,
        location: Option<&str>,
    ) -> Result<JobRef> {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(BqAgentError::InvalidInput("job_id is empty".to_string()));
        }
        let project_id = non_empty(project_id).unwrap_or(self.profile.project_id());
        let location = non_empty(location).unwrap_or(self.profile.location());
        validate_project_id(project_id)?;
        validate_location(location)?;
        Ok(JobRef {
            project_id: project_id.to_string(),
            job_id: job_id.to_string(),
            location: Some(location.to_string()),
        })
    }

    fn query_request(&self, sql: &str) -> QueryRequest {
        QueryRequest {
            project_id: self.profile.project_id().to_string(),
            sql: sql.to_string(),
            default_dataset: Some(self.default_dataset()),
            location: Some(self.profile.location().to_string()),
            max_results: self.settings.max_rows,
        }
    }

    /// Run SQL, enforcing the write mode first.
    pub async fn execute_sql(&self, query: &str) -> Result<Value> {
        let sql = query.trim();
        if sql.is_empty() {
            return Err(BqAgentError::InvalidInput("query is empty".to_string()));
        }

        let request = self.query_request(sql);
        if self.settings.write_mode == WriteMode::Blocked {
            let dry_run = self.warehouse.dry_run(&request).await?;
            match dry_run.statement_type.as_deref() {
                Some(kind) if kind.eq_ignore_ascii_case("SELECT") => {
                    debug!(
                        "Dry run ok, {} byte(s) would be processed",
                        dry_run.total_bytes_processed.unwrap_or(0)
                    );
                }
                other => {
                    warn!("Blocked {} statement", other.unwrap_or("unknown"));
                    return Err(BqAgentError::ReadOnly(format!(
                        "only SELECT statements are allowed, got {}",
                        other.unwrap_or("an unknown statement type")
                    )));
                }
            }
        }

        info!("Executing query on {}", self.profile);
        let result = self.warehouse.run_query(&request).await?;
        self.query_output(result, Some(sql))
    }

    fn query_output(&self, result: QueryResult, sql: Option<&str>) -> Result<Value> {
        let limit = self.settings.max_rows.max(1) as usize;
        let returned = result.rows.len().min(limit);
        let truncated = result.rows.len() > limit
            || result.page_token.is_some()
            || result.total_rows.is_some_and(|t| t > returned as u64);

        let mut out = json!({
            "success": true,
            "complete": result.complete,
            "job_id": result.job.as_ref().map(|j| j.job_id.clone()),
            "location": result.job.as_ref().and_then(|j| j.location.clone()),
            "total_rows": result.total_rows,
            "num_rows": returned,
            "truncated": truncated,
            "page_token": result.page_token,
            "rows": result.rows.into_iter().take(limit).collect::<Vec<_>>(),
            "total_bytes_processed": result.total_bytes_processed,
            "cache_hit": result.cache_hit,
        });
        if let Some(affected) = result.affected_rows {
            out["affected_rows"] = json!(affected);
        }
        if let Some(sql) = sql {
            out["query"] = json!(sql);
        }
        Ok(out)
    }

    /// Schema and metadata of a table.
    pub async fn get_table_metadata(&self, table: &TableRef) -> Result<Value> {
        let metadata = self.warehouse.get_table(table).await?;
        success(&metadata)
    }

    /// Tables in a dataset.
    pub async fn list_tables(&self, dataset: &DatasetRef) -> Result<Value> {
        let tables = self.warehouse.list_tables(dataset).await?;
        Ok(json!({
            "success": true,
            "dataset_id": dataset.to_string(),
            "count": tables.len(),
            "tables": tables,
        }))
    }

    /// A page of results of an earlier job.
    pub async fn get_query_results(
        &self,
        job: &JobRef,
        page_token: Option<&str>,
        max_results: Option<u32>,
    ) -> Result<Value> {
        let max = max_results
            .unwrap_or(self.settings.max_rows)
            .min(self.settings.max_rows)
            .max(1);
        let result = self
            .warehouse
            .query_results(job, non_empty(page_token), max)
            .await?;
        self.query_output(result, None)
    }

    /// Dataset metadata together with its table ids.
    pub async fn get_dataset_info(&self, dataset: &DatasetRef) -> Result<Value> {
        let (metadata, tables) = futures::try_join!(
            self.warehouse.get_dataset(dataset),
            self.warehouse.list_tables(dataset)
        )?;

        let mut out = success(&metadata)?;
        out["tables"] = json!(tables.iter().map(|t| t.table_id.clone()).collect::<Vec<_>>());
        out["num_tables"] = json!(tables.len());
        Ok(out)
    }

    /// Counts grouped by a known dimension, or overall counts.
    pub async fn get_fraud_statistics(&self, dimension: Option<&str>) -> Result<Value> {
        let table = self.profile.quoted_table();
        let sql = match non_empty(dimension) {
            Some(requested) => {
                let dimension = self
                    .settings
                    .dimensions
                    .iter()
                    .find(|d| d.eq_ignore_ascii_case(requested.trim()) && sql::is_column_name(d))
                    .ok_or_else(|| {
                        BqAgentError::InvalidInput(format!(
                            "unknown dimension '{}'; expected one of: {}",
                            requested,
                            self.settings.dimensions.join(", ")
                        ))
                    })?;
                sql::dimension_statistics(&table, dimension)
            }
            None => sql::overall_statistics(&table, &self.settings.dimensions),
        };

        let result = self.warehouse.run_query(&self.query_request(&sql)).await?;
        self.query_output(result, Some(&sql))
    }

    /// Draft SQL for a plain-language request.
    pub async fn generate_query(&self, request: &str) -> Result<Value> {
        let (query, fallback) = self.generate_sql(request).await?;
        Ok(json!({
            "success": true,
            "query": query,
            "fallback": fallback,
            "table_id": self.profile.table_id(),
            "user_request": request,
            "available_dimensions": self.settings.dimensions,
        }))
    }

    /// Draft SQL for an analysis type and run it.
    pub async fn analyze_fraud_patterns(
        &self,
        analysis_type: &str,
        filters: Option<&str>,
    ) -> Result<Value> {
        let mut request = format!("Analyze fraud patterns for {} analysis", analysis_type);
        if let Some(filters) = non_empty(filters) {
            request.push_str(&format!(" with filters: {}", filters));
        }

        let (query, fallback) = self.generate_sql(&request).await?;
        let mut out = self.execute_sql(&query).await?;
        out["analysis_type"] = json!(analysis_type);
        out["generated_with_fallback"] = json!(fallback);
        Ok(out)
    }

    /// Ask the SQL model for a query; returns the query and whether the
    /// fallback was used.
    async fn generate_sql(&self, request: &str) -> Result<(String, bool)> {
        let model = self.sql_model.as_ref().ok_or_else(|| {
            BqAgentError::Agent("SQL generation is not configured".to_string())
        })?;

        let mut vars = HashMap::new();
        vars.insert("table_id".to_string(), self.profile.table_id());
        vars.insert("dimensions".to_string(), self.settings.dimensions.join(", "));
        vars.insert("request".to_string(), request.to_string());

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SQL_GENERATION_SYSTEM)
                .build()
                .map_err(|e| BqAgentError::Agent(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompts::render(SQL_GENERATION_USER, &vars))
                .build()
                .map_err(|e| BqAgentError::Agent(e.to_string()))?
                .into(),
        ];

        let fallback = sql::fallback_query(&self.profile.quoted_table());
        match model.complete(&messages, &[]).await {
            Ok(reply) => {
                let query = sql::strip_sql_fences(reply.content.as_deref().unwrap_or_default());
                if query.is_empty() {
                    warn!("Model returned no SQL, using fallback query");
                    Ok((fallback, true))
                } else {
                    Ok((query, false))
                }
            }
            Err(e) => {
                warn!("SQL generation failed: {}", e);
                Ok((fallback, true))
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn function_tool(name: &str, description: &str, parameters: Value) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: name.to_string(),
            description: Some(description.to_string()),
            parameters: Some(parameters),
            strict: None,
        },
    }
}

/// Get OpenAI function/tool definitions for every tool.
pub fn tool_definitions() -> Vec<ChatCompletionTool> {
    let project = json!({
        "type": "string",
        "description": "Google Cloud project id (default: the configured project)"
    });
    let dataset = json!({
        "type": "string",
        "description": "BigQuery dataset id (default: the configured dataset)"
    });

    vec![
        function_tool(
            "execute_sql",
            "Run a GoogleSQL (standard SQL) query in BigQuery and return the rows. \
            Reference tables fully qualified with backticks.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The SQL query to run"}
                },
                "required": ["query"]
            }),
        ),
        function_tool(
            "get_table_metadata",
            "Get a table's schema (column names, types, modes, descriptions), row count and size. \
            Use this before querying an unfamiliar table.",
            json!({
                "type": "object",
                "properties": {
                    "project_id": project,
                    "dataset_id": dataset,
                    "table_id": {
                        "type": "string",
                        "description": "Table name (default: the configured table)"
                    }
                }
            }),
        ),
        function_tool(
            "list_tables",
            "List all tables in a dataset.",
            json!({
                "type": "object",
                "properties": {
                    "project_id": project,
                    "dataset_id": dataset
                }
            }),
        ),
        function_tool(
            "get_query_results",
            "Fetch rows of a previous query job, e.g. the next page when a result was truncated.",
            json!({
                "type": "object",
                "properties": {
                    "job_id": {"type": "string", "description": "Job id returned by execute_sql"},
                    "project_id": project,
                    "location": {"type": "string", "description": "Job location (default: the configured location)"},
                    "page_token": {"type": "string", "description": "Page token returned with the previous page"},
                    "max_results": {"type": "integer", "description": "Maximum rows to return"}
                },
                "required": ["job_id"]
            }),
        ),
        function_tool(
            "get_dataset_info",
            "Get dataset metadata (description, location, timestamps) and its tables.",
            json!({
                "type": "object",
                "properties": {
                    "project_id": project,
                    "dataset_id": dataset
                }
            }),
        ),
        function_tool(
            "get_fraud_statistics",
            "Count records of the configured table grouped by one known column (top 20), \
            or overall counts when no dimension is given.",
            json!({
                "type": "object",
                "properties": {
                    "dimension": {
                        "type": "string",
                        "description": "Column to group by, e.g. gender, age_bracket, region"
                    }
                }
            }),
        ),
        function_tool(
            "generate_query",
            "Draft a BigQuery SQL query over the configured table from a plain-language request. \
            Does not run it.",
            json!({
                "type": "object",
                "properties": {
                    "request": {"type": "string", "description": "What the query should answer"}
                },
                "required": ["request"]
            }),
        ),
        function_tool(
            "analyze_fraud_patterns",
            "Draft and run a query for an analysis type: demographic, geographic, temporal, \
            company or comprehensive.",
            json!({
                "type": "object",
                "properties": {
                    "analysis_type": {"type": "string", "description": "Kind of analysis"},
                    "filters": {"type": "string", "description": "Optional filters in plain language"}
                },
                "required": ["analysis_type"]
            }),
        ),
    ]
}
