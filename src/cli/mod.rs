//! CLI module for bqagent.

pub mod commands;
mod context;
mod output;
pub mod preflight;

pub use context::{build_agent, build_toolset, connect};
pub use output::{error_message, Output};

use clap::{Parser, Subcommand};

/// bqagent - ask BigQuery questions in plain language
///
/// With no arguments, starts an interactive session. With a question,
/// answers it and exits.
#[derive(Parser, Debug)]
#[command(name = "bqagent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Model name, overriding MODEL_NAME and the config file
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The single-shot question, if one was given.
    pub fn question(&self) -> Option<String> {
        match &self.command {
            Some(Commands::Question(words)) if !words.is_empty() => Some(words.join(" ")),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check configuration, credentials and BigQuery access
    Doctor,

    /// List the tools available to the agent
    Tools,

    /// Run SQL directly, bypassing the model
    Sql {
        /// The SQL statement
        query: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Question to answer; words are joined with spaces
    #[command(external_subcommand)]
    Question(Vec<String>),
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Open configuration file in editor
    Edit,
}
