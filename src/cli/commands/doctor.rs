//! Doctor command - verify configuration, credentials and BigQuery access.

use crate::bigquery::{CredentialSource, TableRef, TokenProvider};
use crate::cli::output::mask_secret;
use crate::cli::{connect, Output};
use crate::config::{
    ConnectionProfile, Settings, DEFAULT_PROJECT_ID, ENV_LLM_API_KEY, ENV_PROJECT_ID,
};
use console::style;
use std::path::PathBuf;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Print a group of checks under a heading.
fn section(title: &str, results: Vec<CheckResult>, all: &mut Vec<CheckResult>) {
    println!("{}", style(title).bold());
    for check in &results {
        check.print();
    }
    println!();
    all.extend(results);
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, explicit: Option<&PathBuf>) -> anyhow::Result<()> {
    Output::header("bqagent Doctor");
    println!();
    println!("Checking configuration, credentials and BigQuery access...\n");

    let mut checks = Vec::new();

    section("Configuration", vec![check_config_file(explicit)], &mut checks);

    let (profile_checks, profile) = check_profile(settings);
    section("Connection Profile", profile_checks, &mut checks);

    section("Model", check_model(settings), &mut checks);

    let (credential_checks, credentials) = check_credentials(settings).await;
    section("Credentials", credential_checks, &mut checks);

    if let (Some(profile), Some(credentials)) = (profile, credentials) {
        section(
            "BigQuery",
            vec![check_table_access(settings, &profile, credentials).await],
            &mut checks,
        );
    }

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using bqagent.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! bqagent is ready to use.");
    }

    Ok(())
}

/// Check if config file exists.
fn check_config_file(explicit: Option<&PathBuf>) -> CheckResult {
    let config_path = explicit
        .map(|p| Settings::expand_path(&p.to_string_lossy()))
        .unwrap_or_else(Settings::default_config_path);
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults and environment",
            "Create with: bqagent config init",
        )
    }
}

fn check_profile(settings: &Settings) -> (Vec<CheckResult>, Option<ConnectionProfile>) {
    let profile = match settings.profile() {
        Ok(p) => p,
        Err(e) => {
            return (
                vec![CheckResult::error(
                    "Profile",
                    &e.to_string(),
                    "Check FRAUD_PROJECT_ID, FRAUD_DATASET_ID, FRAUD_TABLE_NAME and FRAUD_LOCATION",
                )],
                None,
            )
        }
    };

    let mut results = Vec::new();
    if profile.project_id() == DEFAULT_PROJECT_ID {
        results.push(CheckResult::warning(
            "Project",
            &format!("{} (placeholder)", profile.project_id()),
            &format!("Set with: export {}=<your-project>", ENV_PROJECT_ID),
        ));
    } else {
        results.push(CheckResult::ok("Project", profile.project_id()));
    }
    results.push(CheckResult::ok("Table", &profile.table_id()));
    results.push(CheckResult::ok("Location", profile.location()));
    results.push(CheckResult::ok(
        "Write mode",
        &settings.bigquery.write_mode.to_string(),
    ));

    (results, Some(profile))
}

fn check_model(settings: &Settings) -> Vec<CheckResult> {
    let mut results = vec![CheckResult::ok("Model", &settings.llm.model)];

    let endpoint = settings
        .llm
        .base_url
        .clone()
        .filter(|u| !u.is_empty());
    results.push(CheckResult::ok(
        "Endpoint",
        endpoint.as_deref().unwrap_or("https://api.openai.com/v1 (default)"),
    ));

    results.push(match settings.llm.resolved_api_key() {
        Some(key) => CheckResult::ok("API key", &format!("configured ({})", mask_secret(&key))),
        None if endpoint.is_some() => CheckResult::warning(
            "API key",
            "not set",
            "Fine for endpoints that need no key",
        ),
        None => CheckResult::error(
            "API key",
            "not set",
            &format!("Set with: export {}='sk-...'", ENV_LLM_API_KEY),
        ),
    });

    if !settings.llm.verify_ssl {
        results.push(CheckResult::warning(
            "TLS",
            "certificate verification disabled",
            "Set llm.verify_ssl: true unless the endpoint uses a private CA",
        ));
    }

    results
}

async fn check_credentials(settings: &Settings) -> (Vec<CheckResult>, Option<CredentialSource>) {
    let source = match CredentialSource::discover(settings.credentials_path().as_deref()) {
        Ok(s) => s,
        Err(e) => {
            return (
                vec![CheckResult::error(
                    "Credentials",
                    &e.to_string(),
                    "Run: gcloud auth application-default login",
                )],
                None,
            )
        }
    };

    let mut results = vec![CheckResult::ok("Source", &source.describe())];
    if let CredentialSource::Gcloud { .. } = source {
        results.push(check_tool("gcloud", install_hint_gcloud()));
    }

    let provider = TokenProvider::new(source.clone(), reqwest::Client::new());
    match provider.token().await {
        Ok(_) => {
            results.push(CheckResult::ok("Access token", "obtained"));
            (results, Some(source))
        }
        Err(e) => {
            results.push(CheckResult::error(
                "Access token",
                &e.to_string(),
                "Run: gcloud auth application-default login",
            ));
            (results, None)
        }
    }
}

async fn check_table_access(
    settings: &Settings,
    profile: &ConnectionProfile,
    credentials: CredentialSource,
) -> CheckResult {
    let warehouse = match connect(settings, credentials) {
        Ok(w) => w,
        Err(e) => return CheckResult::error("Client", &e.to_string(), "Check bigquery.api_base"),
    };

    let table = TableRef::new(profile.project_id(), profile.dataset_id(), profile.table_name());
    match warehouse.get_table(&table).await {
        Ok(meta) => CheckResult::ok(
            "Table access",
            &format!(
                "{} ({} rows, {} columns)",
                meta.table_id,
                meta.num_rows.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
                meta.schema.len()
            ),
        ),
        Err(e) => CheckResult::error(
            "Table access",
            &e.to_string(),
            "Enable the BigQuery API, grant BigQuery Data Viewer and Job User, and verify the identifiers",
        ),
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str, hint: &str) -> CheckResult {
    let program = if cfg!(windows) && name == "gcloud" {
        "gcloud.cmd"
    } else {
        name
    };
    match Command::new(program).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::ok(name, &crate::cli::output::preview(&version, 50))
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Platform-specific install hint for the Google Cloud CLI.
fn install_hint_gcloud() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install --cask google-cloud-sdk"
    } else {
        "Install from: https://cloud.google.com/sdk/docs/install"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_placeholder_project_warns() {
        let (results, profile) = check_profile(&Settings::default());
        assert!(profile.is_some());
        assert_eq!(results[0].status, CheckStatus::Warning);
    }

    #[test]
    fn test_invalid_profile_is_error() {
        let mut settings = Settings::default();
        settings.bigquery.project_id = "X".to_string();
        let (results, profile) = check_profile(&settings);
        assert!(profile.is_none());
        assert_eq!(results[0].status, CheckStatus::Error);
    }

    #[test]
    fn test_missing_key_with_custom_endpoint_warns() {
        let mut settings = Settings::default();
        settings.llm.api_key = None;
        settings.llm.base_url = Some("http://localhost:4000/v1".to_string());
        let results = check_model(&settings);
        let key = results.iter().find(|r| r.name == "API key").unwrap();
        assert_ne!(key.status, CheckStatus::Error);
    }
}
