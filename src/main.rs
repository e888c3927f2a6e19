//! bqagent CLI entry point.

use anyhow::Result;
use bqagent::cli::{commands, error_message, Cli, Commands, Output};
use bqagent::config::Settings;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("bqagent={}", log_level)),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        Output::error(&error_message(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_ref().map(PathBuf::from);

    if let Some(Commands::Config { action }) = &cli.command {
        let settings = commands::settings_for(action, config_path.as_ref())?;
        return commands::run_config(action, &settings, config_path.as_ref());
    }

    let mut settings = Settings::load_from(config_path.as_ref())?;
    if let Some(model) = &cli.model {
        settings.llm.model = model.clone();
    }

    match &cli.command {
        Some(Commands::Doctor) => commands::run_doctor(&settings, config_path.as_ref()).await,
        Some(Commands::Tools) => {
            commands::run_tools();
            Ok(())
        }
        Some(Commands::Sql { query }) => commands::run_sql(query, &settings).await,
        Some(Commands::Config { .. }) => Ok(()),
        Some(Commands::Question(_)) | None => match cli.question() {
            Some(question) => commands::run_ask(&question, &settings).await,
            None => commands::run_chat(&settings).await,
        },
    }
}
