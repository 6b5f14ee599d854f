//! Azure Authentication
//!
//! Acquires ARM access tokens from a service principal (environment
//! variables), from the Azure CLI, or from a caller-supplied static token
//! (used by tests). Tokens are cached with an expiry buffer so a token
//! about to lapse is never used mid-request.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// OAuth scope for Azure Resource Manager
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if the source does not report one
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Where tokens come from
#[derive(Clone)]
pub enum TokenSource {
    /// Client-credentials flow against Azure AD
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// `az account get-access-token`
    AzureCli,
    /// Fixed token, for tests and short-lived scripted use
    Static(String),
}

impl TokenSource {
    /// Service principal from the conventional environment variables,
    /// falling back to the Azure CLI.
    pub fn from_env() -> Self {
        match (
            std::env::var("AZURE_TENANT_ID"),
            std::env::var("AZURE_CLIENT_ID"),
            std::env::var("AZURE_CLIENT_SECRET"),
        ) {
            (Ok(tenant_id), Ok(client_id), Ok(client_secret)) => TokenSource::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            },
            _ => TokenSource::AzureCli,
        }
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// ARM credentials holder with token caching
#[derive(Clone)]
pub struct ArmCredentials {
    source: TokenSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct AadTokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
}

impl ArmCredentials {
    pub fn new(source: TokenSource) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("azrec/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client for token requests")?;

        Ok(Self {
            source,
            token_cache: Arc::new(RwLock::new(None)),
            http,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(TokenSource::from_env())
    }

    /// Get an access token for ARM calls
    /// Security: Checks token expiry before returning cached token
    pub async fn get_token(&self) -> Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let (token, ttl) = self.fetch_token().await?;
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token)
    }

    async fn fetch_token(&self) -> Result<(String, Duration)> {
        match &self.source {
            TokenSource::Static(token) => Ok((token.clone(), DEFAULT_TOKEN_TTL)),
            TokenSource::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => {
                let url = format!(
                    "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
                    tenant_id
                );
                let params = [
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("scope", ARM_SCOPE),
                ];

                let response = self
                    .http
                    .post(&url)
                    .form(&params)
                    .send()
                    .await
                    .context("Failed to reach the Azure AD token endpoint")?;

                if !response.status().is_success() {
                    bail!(
                        "Azure AD token request failed: {}. Check AZURE_TENANT_ID/CLIENT_ID/CLIENT_SECRET.",
                        response.status()
                    );
                }

                let token: AadTokenResponse = response
                    .json()
                    .await
                    .context("Failed to parse Azure AD token response")?;

                let ttl = token
                    .expires_in
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_TOKEN_TTL);
                Ok((token.access_token, ttl))
            }
            TokenSource::AzureCli => {
                let output = tokio::process::Command::new("az")
                    .args([
                        "account",
                        "get-access-token",
                        "--resource",
                        "https://management.azure.com",
                        "--output",
                        "json",
                    ])
                    .output()
                    .await
                    .context("Failed to run 'az account get-access-token'. Is the Azure CLI installed?")?;

                if !output.status.success() {
                    bail!("'az account get-access-token' failed. Run 'az login' first.");
                }

                let token: CliTokenResponse = serde_json::from_slice(&output.stdout)
                    .context("Failed to parse Azure CLI token output")?;
                // The CLI reports expiry in local time; a conservative TTL
                // avoids parsing ambiguity
                Ok((token.access_token, DEFAULT_TOKEN_TTL))
            }
        }
    }
}

/// Get the Azure CLI configuration directory
pub fn get_azure_config_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("AZURE_CONFIG_DIR") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|p| p.join(".azure"))
}

/// Validate a subscription ID format (UUID)
fn validate_subscription_id(subscription: &str) -> bool {
    let parts: Vec<&str> = subscription.split('-').collect();
    if parts.len() != 5 {
        return false;
    }
    let lengths = [8, 4, 4, 4, 12];
    parts
        .iter()
        .zip(lengths)
        .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Read the default subscription from the environment or the Azure CLI
/// profile
/// Security: Validates subscription ID format before returning
pub fn get_default_subscription() -> Option<String> {
    if let Ok(subscription) = std::env::var("AZURE_SUBSCRIPTION_ID") {
        if validate_subscription_id(&subscription) {
            return Some(subscription);
        }
        tracing::warn!("Invalid subscription ID format in AZURE_SUBSCRIPTION_ID");
    }

    let profile_path = get_azure_config_dir()?.join("azureProfile.json");
    let content = std::fs::read_to_string(&profile_path).ok()?;
    // The CLI writes the profile with a UTF-8 BOM
    let content = content.trim_start_matches('\u{feff}');

    let profile: serde_json::Value = serde_json::from_str(content).ok()?;
    let subscriptions = profile.get("subscriptions")?.as_array()?;

    subscriptions
        .iter()
        .find(|s| s.get("isDefault").and_then(|v| v.as_bool()).unwrap_or(false))
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .filter(|id| validate_subscription_id(id))
        .map(|id| id.to_string())
}
