//! Test doubles for the model and warehouse seams.

use crate::agent::{ChatModel, ModelReply};
use crate::bigquery::{
    DatasetMetadata, DatasetRef, DryRunInfo, FieldSchema, JobRef, QueryRequest, QueryResult,
    TableListing, TableMetadata, TableRef, Warehouse,
};
use crate::error::{BqAgentError, Result};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestMessage, ChatCompletionTool,
    ChatCompletionToolType, FunctionCall,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Model that replays a fixed script and records what it was sent.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    calls: Mutex<Vec<Vec<ChatCompletionRequestMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(text: &str) -> ModelReply {
        ModelReply {
            content: Some(text.to_string()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(id: &str, name: &str, arguments: &str) -> ModelReply {
        ModelReply {
            content: None,
            tool_calls: vec![ChatCompletionMessageToolCall {
                id: id.to_string(),
                r#type: ChatCompletionToolType::Function,
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
        }
    }

    /// Messages of every completed call, in order.
    pub fn calls(&self) -> Vec<Vec<ChatCompletionRequestMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatCompletionRequestMessage],
        _tools: &[ChatCompletionTool],
    ) -> Result<ModelReply> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BqAgentError::OpenAI("script exhausted".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// In-memory warehouse with one table.
pub struct FakeWarehouse {
    statement_type: String,
    rows: usize,
    queries: Mutex<Vec<QueryRequest>>,
    dry_runs: Mutex<usize>,
    tables: Mutex<Vec<TableRef>>,
    pages: Mutex<Vec<(JobRef, Option<String>, u32)>>,
}

impl Default for FakeWarehouse {
    fn default() -> Self {
        Self {
            statement_type: "SELECT".to_string(),
            rows: 0,
            queries: Mutex::new(Vec::new()),
            dry_runs: Mutex::new(0),
            tables: Mutex::new(Vec::new()),
            pages: Mutex::new(Vec::new()),
        }
    }
}

impl FakeWarehouse {
    /// Statement type reported by dry runs.
    pub fn with_statement_type(mut self, statement_type: &str) -> Self {
        self.statement_type = statement_type.to_string();
        self
    }

    /// Number of rows every query returns.
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    /// Queries that were actually run.
    pub fn queries(&self) -> Vec<QueryRequest> {
        self.queries.lock().unwrap().clone()
    }

    pub fn dry_runs(&self) -> usize {
        *self.dry_runs.lock().unwrap()
    }

    pub fn tables_requested(&self) -> Vec<TableRef> {
        self.tables.lock().unwrap().clone()
    }

    /// Job, page token and page size of every result page fetched.
    pub fn result_pages(&self) -> Vec<(JobRef, Option<String>, u32)> {
        self.pages.lock().unwrap().clone()
    }

    fn result(&self, project_id: &str) -> QueryResult {
        let rows = (0..self.rows)
            .map(|i| {
                let mut row = Map::new();
                row.insert("region".to_string(), json!(format!("region_{}", i)));
                row.insert("fraud_count".to_string(), Value::from(i as i64));
                row
            })
            .collect();
        QueryResult {
            job: Some(JobRef {
                project_id: project_id.to_string(),
                job_id: "job_test".to_string(),
                location: Some("US".to_string()),
            }),
            complete: true,
            schema: vec![
                FieldSchema::new("region", "STRING"),
                FieldSchema::new("fraud_count", "INTEGER"),
            ],
            rows,
            total_rows: Some(self.rows as u64),
            ..QueryResult::default()
        }
    }
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn run_query(&self, request: &QueryRequest) -> Result<QueryResult> {
        self.queries.lock().unwrap().push(request.clone());
        Ok(self.result(&request.project_id))
    }

    async fn query_results(
        &self,
        job: &JobRef,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<QueryResult> {
        self.pages
            .lock()
            .unwrap()
            .push((job.clone(), page_token.map(str::to_string), max_results));
        Ok(self.result(&job.project_id))
    }

    async fn dry_run(&self, _request: &QueryRequest) -> Result<DryRunInfo> {
        *self.dry_runs.lock().unwrap() += 1;
        Ok(DryRunInfo {
            statement_type: Some(self.statement_type.clone()),
            total_bytes_processed: Some(0),
        })
    }

    async fn get_table(&self, table: &TableRef) -> Result<TableMetadata> {
        self.tables.lock().unwrap().push(table.clone());
        Ok(TableMetadata {
            table_id: table.to_string(),
            table_type: Some("TABLE".to_string()),
            description: None,
            location: Some("US".to_string()),
            num_rows: Some(self.rows as u64),
            num_bytes: None,
            created: None,
            modified: None,
            schema: vec![FieldSchema::new("region", "STRING")],
        })
    }

    async fn list_tables(&self, dataset: &DatasetRef) -> Result<Vec<TableListing>> {
        Ok(vec![TableListing {
            table_id: format!("{}.fraud_records", dataset),
            dataset_id: dataset.dataset_id.clone(),
            table_name: "fraud_records".to_string(),
            table_type: Some("TABLE".to_string()),
            created: None,
        }])
    }

    async fn get_dataset(&self, dataset: &DatasetRef) -> Result<DatasetMetadata> {
        Ok(DatasetMetadata {
            dataset_id: dataset.to_string(),
            description: None,
            location: Some("US".to_string()),
            created: None,
            modified: None,
        })
    }
}
