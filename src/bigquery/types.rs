//! BigQuery resource types, both wire formats and the shapes handed to tools.

use super::rows::{decode_rows, RawRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reference to a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRef {
    pub project_id: String,
    pub dataset_id: String,
}

impl DatasetRef {
    pub fn new(project_id: &str, dataset_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
        }
    }
}

impl std::fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.project_id, self.dataset_id)
    }
}

/// Reference to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(project_id: &str, dataset_id: &str, table_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// Reference to a query job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRef {
    pub project_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A column in a table or result schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSchema>,
}

impl FieldSchema {
    pub fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mode: None,
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: &str) -> Self {
        self.mode = Some(mode.to_string());
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldSchema>) -> Self {
        self.fields = fields;
        self
    }

    pub fn is_repeated(&self) -> bool {
        self.mode
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("REPEATED"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TableSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

/// Parameters for a synchronous query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Project that runs (and is billed for) the job.
    pub project_id: String,
    pub sql: String,
    pub default_dataset: Option<DatasetRef>,
    pub location: Option<String>,
    /// Page size of the first result page.
    pub max_results: u32,
}

/// Result of a query, with rows decoded into JSON objects.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub job: Option<JobRef>,
    pub complete: bool,
    pub schema: Vec<FieldSchema>,
    pub rows: Vec<Map<String, Value>>,
    pub total_rows: Option<u64>,
    pub page_token: Option<String>,
    pub total_bytes_processed: Option<u64>,
    pub cache_hit: Option<bool>,
    pub affected_rows: Option<u64>,
}

/// Wire format shared by `jobs.query` and `jobs.getQueryResults`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryResponse {
    pub job_reference: Option<JobRef>,
    pub schema: Option<TableSchema>,
    #[serde(default)]
    pub rows: Vec<RawRow>,
    pub total_rows: Option<String>,
    pub page_token: Option<String>,
    pub total_bytes_processed: Option<String>,
    #[serde(default)]
    pub job_complete: bool,
    pub cache_hit: Option<bool>,
    pub num_dml_affected_rows: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorProto {
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl From<QueryResponse> for QueryResult {
    fn from(resp: QueryResponse) -> Self {
        let schema = resp.schema.unwrap_or_default().fields;
        let rows = decode_rows(&schema, &resp.rows);
        Self {
            job: resp.job_reference,
            complete: resp.job_complete,
            schema,
            rows,
            total_rows: parse_u64(resp.total_rows.as_deref()),
            page_token: resp.page_token,
            total_bytes_processed: parse_u64(resp.total_bytes_processed.as_deref()),
            cache_hit: resp.cache_hit,
            affected_rows: parse_u64(resp.num_dml_affected_rows.as_deref()),
        }
    }
}

/// Outcome of a dry run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunInfo {
    pub statement_type: Option<String>,
    pub total_bytes_processed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobResource {
    pub statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobStatistics {
    pub total_bytes_processed: Option<String>,
    pub query: Option<QueryStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryStatistics {
    pub statement_type: Option<String>,
    pub total_bytes_processed: Option<String>,
}

impl From<JobResource> for DryRunInfo {
    fn from(job: JobResource) -> Self {
        let stats = job.statistics;
        let query = stats.as_ref().and_then(|s| s.query.as_ref());
        let bytes = query
            .and_then(|q| q.total_bytes_processed.as_deref())
            .or_else(|| stats.as_ref().and_then(|s| s.total_bytes_processed.as_deref()));
        Self {
            statement_type: query.and_then(|q| q.statement_type.clone()),
            total_bytes_processed: parse_u64(bytes),
        }
    }
}

/// Table metadata returned by `get_table_metadata`.
#[derive(Debug, Clone, Serialize)]
pub struct TableMetadata {
    pub table_id: String,
    pub table_type: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub num_rows: Option<u64>,
    pub num_bytes: Option<u64>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub schema: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableResource {
    pub table_reference: TableRef,
    #[serde(rename = "type")]
    pub table_type: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub schema: Option<TableSchema>,
    pub num_rows: Option<String>,
    pub num_bytes: Option<String>,
    pub creation_time: Option<String>,
    pub last_modified_time: Option<String>,
}

impl From<TableResource> for TableMetadata {
    fn from(t: TableResource) -> Self {
        Self {
            table_id: t.table_reference.to_string(),
            table_type: t.table_type,
            description: t.description.filter(|d| !d.is_empty()),
            location: t.location,
            num_rows: parse_u64(t.num_rows.as_deref()),
            num_bytes: parse_u64(t.num_bytes.as_deref()),
            created: parse_millis(t.creation_time.as_deref()),
            modified: parse_millis(t.last_modified_time.as_deref()),
            schema: t.schema.unwrap_or_default().fields,
        }
    }
}

/// One entry of a table listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableListing {
    pub table_id: String,
    pub dataset_id: String,
    pub table_name: String,
    pub table_type: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableListResponse {
    #[serde(default)]
    pub tables: Vec<TableListEntry>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableListEntry {
    pub table_reference: TableRef,
    #[serde(rename = "type")]
    pub table_type: Option<String>,
    pub creation_time: Option<String>,
}

impl From<TableListEntry> for TableListing {
    fn from(e: TableListEntry) -> Self {
        Self {
            table_id: e.table_reference.to_string(),
            dataset_id: e.table_reference.dataset_id.clone(),
            table_name: e.table_reference.table_id.clone(),
            table_type: e.table_type,
            created: parse_millis(e.creation_time.as_deref()),
        }
    }
}

/// Dataset metadata returned by `get_dataset_info`.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetMetadata {
    pub dataset_id: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DatasetResource {
    pub dataset_reference: DatasetRef,
    pub description: Option<String>,
    pub location: Option<String>,
    pub creation_time: Option<String>,
    pub last_modified_time: Option<String>,
}

impl From<DatasetResource> for DatasetMetadata {
    fn from(d: DatasetResource) -> Self {
        Self {
            dataset_id: d.dataset_reference.to_string(),
            description: d.description.filter(|s| !s.is_empty()),
            location: d.location,
            created: parse_millis(d.creation_time.as_deref()),
            modified: parse_millis(d.last_modified_time.as_deref()),
        }
    }
}

/// Error envelope of a failed REST call.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
    pub status: Option<String>,
}

/// BigQuery encodes 64-bit counters as decimal strings.
fn parse_u64(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.parse().ok())
}

/// Milliseconds since the epoch, as a decimal string.
fn parse_millis(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}
