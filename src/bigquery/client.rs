//! BigQuery REST v2 client.

use super::auth::{CredentialSource, TokenProvider};
use super::types::{
    DatasetMetadata, DatasetRef, DatasetResource, DryRunInfo, ErrorEnvelope, JobRef, JobResource,
    QueryRequest, QueryResponse, QueryResult, TableListResponse, TableListing, TableMetadata,
    TableRef, TableResource,
};
use super::Warehouse;
use crate::config::BigQuerySettings;
use crate::error::{BqAgentError, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Server-side wait per `jobs.query` / `getQueryResults` call.
const POLL_TIMEOUT_MS: u64 = 10_000;

/// Page size used when listing tables.
const LIST_PAGE_SIZE: u32 = 1000;

/// BigQuery client authenticated with Application Default Credentials.
pub struct BigQueryClient {
    http: reqwest::Client,
    base: Url,
    auth: TokenProvider,
    query_timeout: Duration,
}

impl BigQueryClient {
    /// Create a client from settings and a credential source.
    pub fn new(settings: &BigQuerySettings, source: CredentialSource) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(POLL_TIMEOUT_MS) + Duration::from_secs(50))
            .build()?;
        Self::with_http_client(settings, source, http)
    }

    /// Create a client that sends requests through `http`.
    pub fn with_http_client(
        settings: &BigQuerySettings,
        source: CredentialSource,
        http: reqwest::Client,
    ) -> Result<Self> {
        let mut api_base = settings.api_base.clone();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }
        let base = Url::parse(&api_base)?;
        if base.cannot_be_a_base() {
            return Err(BqAgentError::Config(format!(
                "BigQuery API base is not a valid base URL: {}",
                settings.api_base
            )));
        }

        Ok(Self {
            auth: TokenProvider::new(source, http.clone()),
            http,
            base,
            query_timeout: Duration::from_secs(settings.query_timeout_secs),
        })
    }

    /// Build an endpoint URL; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BqAgentError::Config("BigQuery API base cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let token = self.auth.token().await?;
        let mut request = request.bearer_auth(token);
        if let Some(project) = self.auth.source().quota_project() {
            request = request.header("x-goog-user-project", project);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        debug!("GET {}", url);
        self.send(self.http.get(url).query(query)).await
    }

    async fn post<T: DeserializeOwned>(&self, url: Url, body: &serde_json::Value) -> Result<T> {
        debug!("POST {}", url);
        self.send(self.http.post(url).json(body)).await
    }

    async fn get_query_page(
        &self,
        job: &JobRef,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<QueryResult> {
        let url = self.endpoint(&["projects", &job.project_id, "queries", &job.job_id])?;
        let mut query = vec![
            ("maxResults", max_results.to_string()),
            ("timeoutMs", POLL_TIMEOUT_MS.to_string()),
        ];
        if let Some(location) = &job.location {
            query.push(("location", location.clone()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response: QueryResponse = self.get(url, &query).await?;
        query_result(response)
    }
}

/// Turn a non-success response into an error carrying BigQuery's own message.
fn api_error(status: StatusCode, body: &str) -> BqAgentError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(s) => format!("{} ({})", envelope.error.message, s),
            None => envelope.error.message,
        },
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => body.trim().to_string(),
    };
    BqAgentError::BigQuery {
        status: status.as_u16(),
        message,
    }
}

/// Reject completed responses whose errors left no result behind.
///
/// A successful job may still list warnings in `errors`; those come with a
/// schema or rows and are only logged.
fn query_result(response: QueryResponse) -> Result<QueryResult> {
    if response.job_complete && !response.errors.is_empty() {
        let has_result = response.schema.is_some() || !response.rows.is_empty();
        if has_result {
            for err in &response.errors {
                warn!(
                    "Query completed with message: {}",
                    err.message.as_deref().unwrap_or("unknown")
                );
            }
        } else if let Some(err) = response.errors.first() {
            return Err(BqAgentError::BigQuery {
                status: 400,
                message: format!(
                    "{}{}",
                    err.message.as_deref().unwrap_or("query failed"),
                    err.reason
                        .as_deref()
                        .map(|r| format!(" ({})", r))
                        .unwrap_or_default()
                ),
            });
        }
    }
    Ok(QueryResult::from(response))
}

#[async_trait]
impl Warehouse for BigQueryClient {
    #[instrument(skip(self, request), fields(project = %request.project_id))]
    async fn run_query(&self, request: &QueryRequest) -> Result<QueryResult> {
        let url = self.endpoint(&["projects", &request.project_id, "queries"])?;

        let mut body = json!({
            "query": request.sql,
            "useLegacySql": false,
            "maxResults": request.max_results,
            "timeoutMs": POLL_TIMEOUT_MS,
            "requestId": uuid::Uuid::new_v4().to_string(),
        });
        if let Some(location) = &request.location {
            body["location"] = json!(location);
        }
        if let Some(dataset) = &request.default_dataset {
            body["defaultDataset"] = json!(dataset);
        }

        let started = Instant::now();
        let response: QueryResponse = self.post(url, &body).await?;
        let mut result = query_result(response)?;

        while !result.complete {
            if started.elapsed() >= self.query_timeout {
                warn!("Query exceeded {}s", self.query_timeout.as_secs());
                return Err(BqAgentError::QueryTimeout(self.query_timeout.as_secs()));
            }
            let job = result.job.clone().ok_or_else(|| BqAgentError::BigQuery {
                status: 200,
                message: "Incomplete query response without a job reference".to_string(),
            })?;
            debug!("Waiting for job {}", job.job_id);
            result = self.get_query_page(&job, None, request.max_results).await?;
        }

        info!(
            "Query finished: {} row(s), {} byte(s) processed",
            result.total_rows.unwrap_or(0),
            result.total_bytes_processed.unwrap_or(0)
        );
        Ok(result)
    }

    async fn query_results(
        &self,
        job: &JobRef,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<QueryResult> {
        self.get_query_page(job, page_token, max_results).await
    }

    async fn dry_run(&self, request: &QueryRequest) -> Result<DryRunInfo> {
        let url = self.endpoint(&["projects", &request.project_id, "jobs"])?;

        let mut query_config = json!({
            "query": request.sql,
            "useLegacySql": false,
        });
        if let Some(dataset) = &request.default_dataset {
            query_config["defaultDataset"] = json!(dataset);
        }
        let mut job_reference = json!({ "projectId": request.project_id });
        if let Some(location) = &request.location {
            job_reference["location"] = json!(location);
        }

        let body = json!({
            "configuration": { "query": query_config, "dryRun": true },
            "jobReference": job_reference,
        });

        let job: JobResource = self.post(url, &body).await?;
        Ok(DryRunInfo::from(job))
    }

    async fn get_table(&self, table: &TableRef) -> Result<TableMetadata> {
        let url = self.endpoint(&[
            "projects",
            &table.project_id,
            "datasets",
            &table.dataset_id,
            "tables",
            &table.table_id,
        ])?;
        let resource: TableResource = self.get(url, &[]).await?;
        Ok(TableMetadata::from(resource))
    }

    async fn list_tables(&self, dataset: &DatasetRef) -> Result<Vec<TableListing>> {
        let url = self.endpoint(&[
            "projects",
            &dataset.project_id,
            "datasets",
            &dataset.dataset_id,
            "tables",
        ])?;

        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("maxResults", LIST_PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: TableListResponse = self.get(url.clone(), &query).await?;
            tables.extend(page.tables.into_iter().map(TableListing::from));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(tables)
    }

    async fn get_dataset(&self, dataset: &DatasetRef) -> Result<DatasetMetadata> {
        let url = self.endpoint(&[
            "projects",
            &dataset.project_id,
            "datasets",
            &dataset.dataset_id,
        ])?;
        let resource: DatasetResource = self.get(url, &[]).await?;
        Ok(DatasetMetadata::from(resource))
    }
}
