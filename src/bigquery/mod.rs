//! BigQuery access.
//!
//! The [`Warehouse`] trait is the seam between the toolset and BigQuery;
//! [`BigQueryClient`] implements it over the REST API.

pub mod auth;
mod client;
mod rows;
mod types;

pub use auth::{CredentialSource, TokenProvider};
pub use client::BigQueryClient;
pub use rows::{decode_rows, RawCell, RawRow};
pub use types::{
    DatasetMetadata, DatasetRef, DryRunInfo, FieldSchema, JobRef, QueryRequest, QueryResult,
    TableListing, TableMetadata, TableRef,
};

use crate::error::Result;
use async_trait::async_trait;

/// Operations the toolset needs from BigQuery.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Run a query and wait for it to complete.
    async fn run_query(&self, request: &QueryRequest) -> Result<QueryResult>;

    /// Fetch a page of results of an existing query job.
    async fn query_results(
        &self,
        job: &JobRef,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<QueryResult>;

    /// Validate a query without running it.
    async fn dry_run(&self, request: &QueryRequest) -> Result<DryRunInfo>;

    /// Get table schema and metadata.
    async fn get_table(&self, table: &TableRef) -> Result<TableMetadata>;

    /// List all tables in a dataset.
    async fn list_tables(&self, dataset: &DatasetRef) -> Result<Vec<TableListing>>;

    /// Get dataset metadata.
    async fn get_dataset(&self, dataset: &DatasetRef) -> Result<DatasetMetadata>;
}
