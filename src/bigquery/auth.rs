//! Access tokens from Google Application Default Credentials.
//!
//! Credential issuance stays with Google's tooling: user credentials written by
//! `gcloud auth application-default login` are refreshed against the OAuth
//! token endpoint, and every other credential type is handed to the `gcloud`
//! CLI.

use crate::error::{BqAgentError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Environment variable with a ready-made OAuth access token.
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
/// Environment variable pointing at a credentials JSON file.
pub const ENV_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// gcloud does not report token lifetime, so its tokens are reused briefly.
const GCLOUD_TOKEN_TTL_SECS: i64 = 300;

/// Where access tokens come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    /// A fixed token from the environment.
    StaticToken(String),
    /// `authorized_user` credentials with a refresh token.
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        quota_project_id: Option<String>,
        path: PathBuf,
    },
    /// Delegate to `gcloud auth application-default print-access-token`.
    /// A `path` is handed to gcloud as its credentials file.
    Gcloud {
        quota_project_id: Option<String>,
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    quota_project_id: Option<String>,
}

impl CredentialSource {
    /// Discover credentials from the process environment.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        Self::discover_with(
            explicit,
            |key| std::env::var(key).ok(),
            well_known_credentials_path(),
        )
    }

    /// Discover credentials using the given environment lookup and
    /// well-known file location.
    pub fn discover_with<F>(
        explicit: Option<&Path>,
        lookup: F,
        well_known: Option<PathBuf>,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(ENV_ACCESS_TOKEN).filter(|t| !t.trim().is_empty()) {
            debug!("Using access token from {}", ENV_ACCESS_TOKEN);
            return Ok(CredentialSource::StaticToken(token.trim().to_string()));
        }

        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Some(path) = lookup(ENV_CREDENTIALS).filter(|p| !p.trim().is_empty()) {
            let path = PathBuf::from(shellexpand::tilde(path.trim()).to_string());
            if !path.exists() {
                return Err(BqAgentError::Auth(format!(
                    "{} points to {}, which does not exist",
                    ENV_CREDENTIALS,
                    path.display()
                )));
            }
            return Self::from_file(&path);
        }

        if let Some(path) = well_known.filter(|p| p.exists()) {
            return Self::from_file(&path);
        }

        debug!("No credentials file found, falling back to gcloud");
        Ok(CredentialSource::Gcloud {
            quota_project_id: None,
            path: None,
        })
    }

    /// Read an Application Default Credentials JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BqAgentError::Auth(format!("Cannot read credentials {}: {}", path.display(), e))
        })?;
        let file: CredentialsFile = serde_json::from_str(&content).map_err(|e| {
            BqAgentError::Auth(format!("Invalid credentials {}: {}", path.display(), e))
        })?;

        match file.kind.as_str() {
            "authorized_user" => {
                let missing = |field: &str| {
                    BqAgentError::Auth(format!(
                        "{} is missing '{}'. Run: gcloud auth application-default login",
                        path.display(),
                        field
                    ))
                };
                Ok(CredentialSource::AuthorizedUser {
                    client_id: file.client_id.ok_or_else(|| missing("client_id"))?,
                    client_secret: file.client_secret.ok_or_else(|| missing("client_secret"))?,
                    refresh_token: file.refresh_token.ok_or_else(|| missing("refresh_token"))?,
                    quota_project_id: file.quota_project_id,
                    path: path.to_path_buf(),
                })
            }
            other => {
                debug!("Delegating '{}' credentials to gcloud", other);
                Ok(CredentialSource::Gcloud {
                    quota_project_id: file.quota_project_id,
                    path: Some(path.to_path_buf()),
                })
            }
        }
    }

    /// Project to bill API quota to, when the credentials name one.
    pub fn quota_project(&self) -> Option<&str> {
        match self {
            CredentialSource::StaticToken(_) => None,
            CredentialSource::AuthorizedUser {
                quota_project_id, ..
            }
            | CredentialSource::Gcloud {
                quota_project_id, ..
            } => quota_project_id.as_deref(),
        }
    }

    /// Human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            CredentialSource::StaticToken(_) => format!("access token from {}", ENV_ACCESS_TOKEN),
            CredentialSource::AuthorizedUser { path, .. } => {
                format!("user credentials ({})", path.display())
            }
            CredentialSource::Gcloud { path: Some(p), .. } => {
                format!("gcloud with {}", p.display())
            }
            CredentialSource::Gcloud { path: None, .. } => "gcloud CLI".to_string(),
        }
    }
}

/// Location of the file written by `gcloud auth application-default login`.
pub fn well_known_credentials_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("CLOUDSDK_CONFIG") {
        return Some(PathBuf::from(dir).join("application_default_credentials.json"));
    }
    let base = if cfg!(windows) {
        dirs::config_dir()?
    } else {
        dirs::home_dir()?.join(".config")
    };
    Some(base.join("gcloud").join("application_default_credentials.json"))
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Supplies (and caches) bearer tokens for BigQuery requests.
pub struct TokenProvider {
    source: CredentialSource,
    http: reqwest::Client,
    cached: Mutex<Option<AccessToken>>,
    gcloud: PathBuf,
}

impl TokenProvider {
    pub fn new(source: CredentialSource, http: reqwest::Client) -> Self {
        Self {
            source,
            http,
            cached: Mutex::new(None),
            gcloud: PathBuf::from(gcloud_program()),
        }
    }

    /// Use another `gcloud` executable.
    #[cfg(test)]
    fn with_gcloud_program(mut self, program: PathBuf) -> Self {
        self.gcloud = program;
        self
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// Return a valid access token, refreshing it when needed.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.token.clone());
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn fetch(&self) -> Result<AccessToken> {
        match &self.source {
            CredentialSource::StaticToken(token) => Ok(AccessToken {
                token: token.clone(),
                expires_at: Utc::now() + Duration::days(1),
            }),
            CredentialSource::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                ..
            } => self.refresh(client_id, client_secret, refresh_token).await,
            CredentialSource::Gcloud { path, .. } => {
                gcloud_token(&self.gcloud, path.as_deref()).await
            }
        }
    }

    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<AccessToken> {
        debug!("Refreshing user access token");

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BqAgentError::Auth(format!(
                "Token refresh failed ({}): {}. Run: gcloud auth application-default login",
                status.as_u16(),
                body.trim()
            )));
        }

        let token: TokenResponse = response.json().await?;
        info!("Obtained access token from refresh token");
        Ok(AccessToken {
            token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in.unwrap_or(3600)),
        })
    }
}

fn gcloud_program() -> &'static str {
    if cfg!(windows) {
        "gcloud.cmd"
    } else {
        "gcloud"
    }
}

/// Ask gcloud for a token, pointing it at `credentials` when given.
async fn gcloud_token(program: &Path, credentials: Option<&Path>) -> Result<AccessToken> {
    debug!("Requesting access token from gcloud");

    let mut command = tokio::process::Command::new(program);
    command.args(["auth", "application-default", "print-access-token"]);
    if let Some(path) = credentials {
        command.env(ENV_CREDENTIALS, path);
    }

    let output = command
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BqAgentError::ToolNotFound("gcloud".to_string())
            } else {
                BqAgentError::ToolFailed(format!("gcloud: {}", e))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BqAgentError::Auth(format!(
            "gcloud could not provide a token: {}",
            stderr.trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(BqAgentError::Auth(
            "gcloud returned an empty access token".to_string(),
        ));
    }

    Ok(AccessToken {
        token,
        expires_at: Utc::now() + Duration::seconds(GCLOUD_TOKEN_TTL_SECS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_json(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_static_token_wins() {
        let source = CredentialSource::discover_with(
            None,
            |k| (k == ENV_ACCESS_TOKEN).then(|| " ya29.token ".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(source, CredentialSource::StaticToken("ya29.token".to_string()));
    }

    #[test]
    fn test_authorized_user_file() {
        let file = write_json(
            r#"{"type": "authorized_user", "client_id": "cid", "client_secret": "secret",
                "refresh_token": "rt", "quota_project_id": "billing-project"}"#,
        );
        let source = CredentialSource::from_file(file.path()).unwrap();
        assert!(matches!(source, CredentialSource::AuthorizedUser { .. }));
        assert_eq!(source.quota_project(), Some("billing-project"));
    }

    #[test]
    fn test_service_account_delegates_to_gcloud() {
        let file = write_json(r#"{"type": "service_account", "client_email": "sa@p.iam"}"#);
        let source = CredentialSource::from_file(file.path()).unwrap();
        assert!(matches!(source, CredentialSource::Gcloud { path: Some(_), .. }));
    }

    #[test]
    fn test_authorized_user_missing_field() {
        let file = write_json(r#"{"type": "authorized_user", "client_id": "cid"}"#);
        let err = CredentialSource::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn test_env_path_must_exist() {
        let result = CredentialSource::discover_with(
            None,
            |k| (k == ENV_CREDENTIALS).then(|| "/nonexistent/creds.json".to_string()),
            None,
        );
        assert!(matches!(result, Err(BqAgentError::Auth(_))));
    }

    #[test]
    fn test_well_known_then_gcloud_fallback() {
        let file = write_json(
            r#"{"type": "authorized_user", "client_id": "a", "client_secret": "b", "refresh_token": "c"}"#,
        );
        let source =
            CredentialSource::discover_with(None, no_env, Some(file.path().to_path_buf())).unwrap();
        assert!(matches!(source, CredentialSource::AuthorizedUser { .. }));

        let source = CredentialSource::discover_with(
            None,
            no_env,
            Some(PathBuf::from("/nonexistent/adc.json")),
        )
        .unwrap();
        assert_eq!(
            source,
            CredentialSource::Gcloud {
                quota_project_id: None,
                path: None
            }
        );
    }

    #[test]
    fn test_token_freshness_margin() {
        let now = Utc::now();
        let token = AccessToken {
            token: "t".to_string(),
            expires_at: now + Duration::seconds(30),
        };
        assert!(!token.is_fresh(now));

        let token = AccessToken {
            token: "t".to_string(),
            expires_at: now + Duration::seconds(600),
        };
        assert!(token.is_fresh(now));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_gcloud_uses_configured_credentials() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let gcloud = dir.path().join("gcloud");
        std::fs::write(
            &gcloud,
            "#!/bin/sh\necho \"token-for:${GOOGLE_APPLICATION_CREDENTIALS:-UNSET}\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&gcloud, std::fs::Permissions::from_mode(0o755)).unwrap();

        let key = dir.path().join("sa.json");
        std::fs::write(&key, r#"{"type": "service_account", "client_email": "sa@p.iam"}"#).unwrap();

        let source = CredentialSource::discover_with(Some(key.as_path()), no_env, None).unwrap();
        let provider =
            TokenProvider::new(source, reqwest::Client::new()).with_gcloud_program(gcloud.clone());
        let token = provider.token().await.unwrap();
        assert_eq!(token, format!("token-for:{}", key.display()));

        let ambient = CredentialSource::Gcloud {
            quota_project_id: None,
            path: None,
        };
        let provider =
            TokenProvider::new(ambient, reqwest::Client::new()).with_gcloud_program(gcloud);
        let token = provider.token().await.unwrap();
        assert!(token.starts_with("token-for:"));
    }

    #[test]
    fn test_static_token_provider() {
        let provider = TokenProvider::new(
            CredentialSource::StaticToken("abc".to_string()),
            reqwest::Client::new(),
        );
        let token = tokio_test::block_on(provider.token()).unwrap();
        assert_eq!(token, "abc");
    }
}
