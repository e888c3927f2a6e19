//! Connection profile: the identifiers that scope BigQuery access.

use crate::error::{BqAgentError, Result};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static PROJECT_ID: LazyLock<Regex> = LazyLock::new(|| {
    // Optional legacy domain scope, e.g. "example.com:my-project"
    Regex::new(r"^(?:[a-z0-9][a-z0-9.-]*[a-z0-9]:)?[a-z][a-z0-9-]{4,28}[a-z0-9]$")
        .expect("Invalid regex")
});

static DATASET_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid regex"));

static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{M}\p{N}\p{Pc}\p{Pd}\p{Zs}]+$").expect("Invalid regex")
});

/// Dataset ids and table names are limited to 1024 characters.
const MAX_ID_LEN: usize = 1024;

static LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").expect("Invalid regex"));

/// Project, dataset, table and location the agent is scoped to.
///
/// Built once at startup from [`Settings`](super::Settings) and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionProfile {
    project_id: String,
    dataset_id: String,
    table_name: String,
    location: String,
}

impl ConnectionProfile {
    /// Create a profile, validating every identifier.
    pub fn new(
        project_id: &str,
        dataset_id: &str,
        table_name: &str,
        location: &str,
    ) -> Result<Self> {
        validate_project_id(project_id)?;
        validate_dataset_id(dataset_id)?;
        validate_table_name(table_name)?;
        validate_location(location)?;

        Ok(Self {
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
            table_name: table_name.to_string(),
            location: location.to_string(),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Fully qualified table id: `project.dataset.table`.
    pub fn table_id(&self) -> String {
        format!("{}.{}.{}", self.project_id, self.dataset_id, self.table_name)
    }

    /// Table id quoted for use inside standard SQL.
    pub fn quoted_table(&self) -> String {
        format!("`{}`", self.table_id())
    }
}

impl std::fmt::Display for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.table_id(), self.location)
    }
}

fn invalid(kind: &'static str, value: &str, reason: &str) -> BqAgentError {
    BqAgentError::InvalidIdentifier {
        kind,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate a Google Cloud project id.
pub fn validate_project_id(value: &str) -> Result<()> {
    if PROJECT_ID.is_match(value) {
        Ok(())
    } else {
        Err(invalid(
            "project id",
            value,
            "expected 6-30 lowercase letters, digits or hyphens, starting with a letter",
        ))
    }
}

/// Validate a BigQuery dataset id.
pub fn validate_dataset_id(value: &str) -> Result<()> {
    if value.len() <= MAX_ID_LEN && DATASET_ID.is_match(value) {
        Ok(())
    } else {
        Err(invalid(
            "dataset id",
            value,
            "expected letters, digits or underscores (max 1024)",
        ))
    }
}

/// Validate a BigQuery table name.
pub fn validate_table_name(value: &str) -> Result<()> {
    if value.chars().count() <= MAX_ID_LEN && TABLE_NAME.is_match(value) {
        Ok(())
    } else {
        Err(invalid(
            "table name",
            value,
            "expected letters, numbers, underscores, dashes or spaces (max 1024)",
        ))
    }
}

/// Validate a BigQuery location such as `US`, `EU` or `europe-west1`.
pub fn validate_location(value: &str) -> Result<()> {
    if LOCATION.is_match(value) {
        Ok(())
    } else {
        Err(invalid("location", value, "expected a region name like US or europe-west1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_profile() {
        let profile =
            ConnectionProfile::new("my-project-123", "fraud_data", "fraud_records", "US").unwrap();
        assert_eq!(profile.table_id(), "my-project-123.fraud_data.fraud_records");
        assert_eq!(profile.quoted_table(), "`my-project-123.fraud_data.fraud_records`");
        assert_eq!(profile.location(), "US");
    }

    #[test]
    fn test_default_placeholder_project_is_valid() {
        assert!(validate_project_id("your-gcp-project-id").is_ok());
    }

    #[test]
    fn test_domain_scoped_project() {
        assert!(validate_project_id("example.com:analytics-prod").is_ok());
    }

    #[test]
    fn test_invalid_project_ids() {
        for bad in ["", "abc", "My-Project", "1project", "project-", "proj_ect"] {
            assert!(validate_project_id(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_dataset_rejects_dashes_and_dots() {
        assert!(validate_dataset_id("fraud_data_2024").is_ok());
        assert!(validate_dataset_id("fraud-data").is_err());
        assert!(validate_dataset_id("a.b").is_err());
        assert!(validate_dataset_id("").is_err());
    }

    #[test]
    fn test_table_name_allows_unicode_and_spaces() {
        assert!(validate_table_name("aggregated_fraud_table").is_ok());
        assert!(validate_table_name("fraud records-2024").is_ok());
        assert!(validate_table_name("données").is_ok());
        assert!(validate_table_name("fraud;DROP").is_err());
        assert!(validate_table_name("a`b").is_err());
    }

    #[test]
    fn test_invalid_profile_names_field() {
        let err = ConnectionProfile::new("my-project-123", "bad-dataset", "t", "US").unwrap_err();
        assert!(err.to_string().contains("dataset id"));
    }

    #[test]
    fn test_location() {
        assert!(validate_location("europe-west1").is_ok());
        assert!(validate_location("EU").is_ok());
        assert!(validate_location("").is_err());
        assert!(validate_location("us central").is_err());
    }
}
