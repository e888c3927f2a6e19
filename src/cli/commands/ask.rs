//! Single-shot question.

use crate::cli::preflight::{self, Operation};
use crate::cli::{build_agent, connect, Output};
use crate::config::Settings;
use anyhow::Result;

/// Answer one question and print the response.
pub async fn run_ask(question: &str, settings: &Settings) -> Result<()> {
    let credentials = match preflight::check(Operation::Ask, settings) {
        Ok(c) => c,
        Err(e) => {
            Output::error(&format!("{}", e));
            Output::info("Run 'bqagent doctor' for detailed diagnostics.");
            return Err(e.into());
        }
    };

    let warehouse = connect(settings, credentials)?;
    let agent = build_agent(settings, warehouse, None)?;

    let spinner = Output::spinner("Thinking...");
    let result = agent.run(question).await;
    spinner.finish_and_clear();

    let response = result?;
    for record in &response.tool_calls {
        Output::tool_call(record);
    }
    println!("{}", response.content);

    Ok(())
}
