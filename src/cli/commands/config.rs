//! Config command implementation.

use crate::cli::output::mask_secret;
use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;
use tracing::warn;

/// Load the settings a config action works on.
///
/// `init` and `edit` replace or repair the file, so a file that does not
/// load falls back to defaults for them. Other actions report the error.
pub fn settings_for(action: &ConfigAction, explicit: Option<&PathBuf>) -> Result<Settings> {
    match action {
        ConfigAction::Init { .. } | ConfigAction::Edit => {
            Ok(Settings::load_from(explicit).unwrap_or_else(|e| {
                warn!("Ignoring unreadable config: {}", e);
                Settings::default()
            }))
        }
        ConfigAction::Show | ConfigAction::Path => Ok(Settings::load_from(explicit)?),
    }
}

/// Run the config command. `explicit` is the `--config` path, if given.
pub fn run_config(
    action: &ConfigAction,
    settings: &Settings,
    explicit: Option<&PathBuf>,
) -> Result<()> {
    let config_path = explicit
        .map(|p| Settings::expand_path(&p.to_string_lossy()))
        .unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            print!("{}", redacted(settings).to_string_for(&config_path)?);
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }

        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                Output::warning(&format!(
                    "{} already exists. Use --force to overwrite.",
                    config_path.display()
                ));
                return Ok(());
            }
            Settings::default().save_to(&config_path)?;
            Output::success(&format!("Wrote default config to {}", config_path.display()));
        }

        ConfigAction::Edit => {
            if !config_path.exists() {
                Settings::default().save_to(&config_path)?;
                Output::info(&format!("Created default config at {}", config_path.display()));
            }

            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
            Output::info(&format!("Opening config in {}...", editor));

            match std::process::Command::new(&editor).arg(&config_path).status() {
                Ok(s) if s.success() => Output::success("Config saved."),
                Ok(_) => Output::warning("Editor exited with non-zero status."),
                Err(e) => {
                    Output::error(&format!("Failed to open editor: {}", e));
                    Output::info(&format!("Config file is at: {}", config_path.display()));
                }
            }
        }
    }

    Ok(())
}

/// Settings safe to print.
fn redacted(settings: &Settings) -> Settings {
    let mut shown = settings.clone();
    shown.llm.api_key = shown.llm.api_key.as_deref().map(mask_secret);
    shown
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_redacted_hides_key() {
        let mut settings = Settings::default();
        settings.llm.api_key = Some("sk-live-0123456789abcdef".to_string());
        let shown = redacted(&settings);
        assert_eq!(shown.llm.api_key.as_deref(), Some("sk-l...cdef"));
    }

    #[test]
    fn test_init_writes_loadable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let init = ConfigAction::Init { force: false };
        run_config(&init, &Settings::default(), Some(&path)).unwrap();
        assert!(path.exists());

        let loaded = Settings::from_file(&path).unwrap();
        assert_eq!(loaded.bigquery.dataset_id, "fraud_data");
    }

    #[test]
    fn test_show_reports_broken_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "bigquery:\n  dataset_id: [unclosed\n").unwrap();

        let err = settings_for(&ConfigAction::Show, Some(&path)).unwrap_err();
        assert!(err.to_string().contains("YAML parse error"));

        let settings = settings_for(&ConfigAction::Init { force: true }, Some(&path)).unwrap();
        assert_eq!(settings.agent.name, Settings::default().agent.name);
        assert!(settings_for(&ConfigAction::Edit, Some(&path)).is_ok());
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "bigquery:\n  dataset_id: mine\n").unwrap();

        let init = ConfigAction::Init { force: false };
        run_config(&init, &Settings::default(), Some(&path)).unwrap();
        let loaded = Settings::from_file(&path).unwrap();
        assert_eq!(loaded.bigquery.dataset_id, "mine");
    }
}
