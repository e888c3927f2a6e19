//! bqagent - natural-language questions over BigQuery
//!
//! A thin agent that answers questions about a BigQuery table by letting an
//! OpenAI-compatible model call BigQuery tools.
//!
//! # Overview
//!
//! bqagent allows you to:
//! - Ask a single question from the command line, or chat interactively
//! - Inspect schemas, list tables and run read-only SQL through the model
//! - Point the agent at any project, dataset and table with `FRAUD_*` variables
//!
//! # Architecture
//!
//! - `config` - Settings, connection profile and prompt templates
//! - `bigquery` - REST client, credentials and row decoding
//! - `agent` - Model abstraction, toolset, tool calling loop and chat session
//! - `cli` - Command line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use bqagent::bigquery::CredentialSource;
//! use bqagent::cli::{build_agent, connect};
//! use bqagent::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let credentials = CredentialSource::discover(settings.credentials_path().as_deref())?;
//!     let warehouse = connect(&settings, credentials)?;
//!     let agent = build_agent(&settings, warehouse, None)?;
//!
//!     let response = agent.run("How many fraud cases are there per region?").await?;
//!     println!("{}", response.content);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod bigquery;
pub mod cli;
pub mod config;
pub mod error;
pub mod openai;

#[cfg(test)]
mod testing;

pub use error::{BqAgentError, Result};
