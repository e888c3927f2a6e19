//! Direct SQL through the toolset.

use crate::cli::preflight::{self, Operation};
use crate::cli::{build_toolset, connect, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run one SQL statement with the same checks the agent gets.
pub async fn run_sql(query: &str, settings: &Settings) -> Result<()> {
    let credentials = match preflight::check(Operation::Query, settings) {
        Ok(c) => c,
        Err(e) => {
            Output::error(&format!("{}", e));
            Output::info("Run 'bqagent doctor' for detailed diagnostics.");
            return Err(e.into());
        }
    };

    let warehouse = connect(settings, credentials)?;
    let toolset = build_toolset(settings, warehouse, None)?;

    let spinner = Output::spinner("Running query...");
    let result = toolset.execute_sql(query).await;
    spinner.finish_and_clear();

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
