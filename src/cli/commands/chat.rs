//! Interactive session.

use crate::agent::ChatSession;
use crate::cli::preflight::{self, Operation};
use crate::cli::{build_agent, connect, Output};
use crate::config::Settings;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// What to do with one line of input.
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Skip,
    Quit,
    Clear,
    Message(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Input::Skip
    } else if ["quit", "exit", "q"]
        .iter()
        .any(|cmd| trimmed.eq_ignore_ascii_case(cmd))
    {
        Input::Quit
    } else if trimmed.eq_ignore_ascii_case("clear") {
        Input::Clear
    } else {
        Input::Message(trimmed)
    }
}

/// Run the interactive loop until quit or end of input.
pub async fn run_chat(settings: &Settings) -> Result<()> {
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
    let profile = agent.tools().profile().clone();
    let mut chat = ChatSession::new(agent, settings.agent.history_limit)?;

    println!("\n{}", style("BigQuery Agent").bold().cyan());
    println!(
        "{}",
        style(format!(
            "Project: {}  Dataset: {}  Table: {}",
            profile.project_id(),
            profile.dataset_id(),
            profile.table_name()
        ))
        .dim()
    );
    println!(
        "{}\n",
        style("Ask a question, 'clear' to reset the conversation, 'quit' to leave.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        match classify(&line) {
            Input::Skip => continue,
            Input::Quit => {
                Output::info("Goodbye!");
                break;
            }
            Input::Clear => {
                chat.clear_history();
                Output::info("Conversation history cleared.");
            }
            Input::Message(text) => {
                let spinner = Output::spinner("Thinking...");
                let result = chat.send_message(text).await;
                spinner.finish_and_clear();

                match result {
                    Ok(response) => {
                        for record in &response.tool_calls {
                            Output::tool_call(record);
                        }
                        println!("\n{} {}\n", style("Agent:").cyan().bold(), response.content);
                    }
                    Err(e) => Output::error(&format!("Error: {}", e)),
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_input() {
        assert_eq!(classify("   \n"), Input::Skip);
        assert_eq!(classify("quit\n"), Input::Quit);
        assert_eq!(classify("EXIT"), Input::Quit);
        assert_eq!(classify(" q "), Input::Quit);
        assert_eq!(classify("Clear"), Input::Clear);
        assert_eq!(
            classify("  top regions by count \n"),
            Input::Message("top regions by count")
        );
        assert_eq!(classify("quit smoking stats"), Input::Message("quit smoking stats"));
    }
}
