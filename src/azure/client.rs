//! ARM Client
//!
//! Main client for interacting with Azure Resource Manager, combining
//! authentication, HTTP, URL construction and long-running-operation
//! polling. From the caller's point of view every mutating call blocks
//! until the backend reaches a terminal state.

use super::auth::ArmCredentials;
use super::http::{ArmHttpClient, ArmResponse};
use crate::resource::registry::ResourceDef;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Default interval between long-running-operation polls when the server
/// does not send Retry-After
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on operation polls before giving up
const MAX_POLL_ATTEMPTS: u32 = 120;

/// Main ARM client
#[derive(Clone)]
pub struct ArmClient {
    pub credentials: ArmCredentials,
    pub http: ArmHttpClient,
    pub subscription_id: String,
    endpoint: String,
    poll_interval: Duration,
}

impl ArmClient {
    /// Create a new ARM client against the public Azure endpoint
    pub fn new(credentials: ArmCredentials, subscription_id: &str) -> Result<Self> {
        let http = ArmHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            subscription_id: subscription_id.to_string(),
            endpoint: "https://management.azure.com".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Point the client at a different management endpoint (sovereign
    /// clouds, mock servers in tests)
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    /// Override the fallback poll interval for long-running operations
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    // =========================================================================
    // URL builders
    // =========================================================================

    /// URL of a single resource
    pub fn resource_url(&self, def: &ResourceDef, resource_group: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}?api-version={}",
            self.endpoint,
            self.subscription_id,
            resource_group,
            def.provider,
            def.collection,
            name,
            def.api_version
        )
    }

    /// URL of a resource collection within a resource group
    pub fn collection_url(&self, def: &ResourceDef, resource_group: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}/{}?api-version={}",
            self.endpoint,
            self.subscription_id,
            resource_group,
            def.provider,
            def.collection,
            def.api_version
        )
    }

    /// URL of a resource collection across the whole subscription
    pub fn subscription_url(&self, def: &ResourceDef) -> String {
        format!(
            "{}/subscriptions/{}/providers/{}/{}?api-version={}",
            self.endpoint, self.subscription_id, def.provider, def.collection, def.api_version
        )
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    /// GET a URL, treating any non-success status as an error
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        let response = self.http.get(url, &token).await?;

        if !response.status.is_success() {
            return Err(anyhow!(response.error_message()));
        }
        Ok(response.body)
    }

    /// GET a URL, mapping 404 to `None`
    pub async fn get_optional(&self, url: &str) -> Result<Option<Value>> {
        let token = self.get_token().await?;
        let response = self.http.get(url, &token).await?;

        if response.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status.is_success() {
            return Err(anyhow!(response.error_message()));
        }
        Ok(Some(response.body))
    }

    /// PUT a request body (ARM's create-or-update entry point) and block
    /// until the resulting resource is fully provisioned
    pub async fn put(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.get_token().await?;
        let response = self.http.put(url, &token, body).await?;

        if !response.status.is_success() {
            return Err(anyhow!(response.error_message()));
        }

        if let Some(operation_url) = &response.operation_url {
            self.wait_for_operation(operation_url, response.retry_after)
                .await?;
            // The operation status body is not the resource; re-read it
            return self.get(url).await;
        }

        if response.body.is_null() {
            return self.get(url).await;
        }
        Ok(response.body)
    }

    /// DELETE a URL and block until the deletion completes
    pub async fn delete(&self, url: &str) -> Result<()> {
        let token = self.get_token().await?;
        let response = self.http.delete(url, &token).await?;

        // Deleting something already gone is success
        if response.status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status.is_success() {
            return Err(anyhow!(response.error_message()));
        }

        if let Some(operation_url) = &response.operation_url {
            self.wait_for_operation(operation_url, response.retry_after)
                .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Long-running operations
    // =========================================================================

    /// Poll an Azure-AsyncOperation URL until it reaches a terminal state
    async fn wait_for_operation(
        &self,
        operation_url: &str,
        initial_delay: Option<Duration>,
    ) -> Result<()> {
        let mut delay = initial_delay.unwrap_or(self.poll_interval);

        for attempt in 1..=MAX_POLL_ATTEMPTS {
            tokio::time::sleep(delay).await;

            let token = self.get_token().await?;
            let response = self
                .http
                .get(operation_url, &token)
                .await
                .context("Failed to poll operation status")?;

            if !response.status.is_success() {
                return Err(anyhow!(response.error_message()));
            }

            match operation_state(&response) {
                OperationState::Succeeded => {
                    tracing::debug!("Operation succeeded after {} poll(s)", attempt);
                    return Ok(());
                }
                OperationState::Failed(message) => {
                    bail!("Operation failed: {}", message);
                }
                OperationState::Running => {
                    delay = response.retry_after.unwrap_or(self.poll_interval);
                }
            }
        }

        bail!(
            "Operation did not complete after {} polls; giving up",
            MAX_POLL_ATTEMPTS
        )
    }
}

enum OperationState {
    Succeeded,
    Failed(String),
    Running,
}

/// Interpret one poll response. A `Location`-style poll has no status
/// body: 200 means done, 202 means still running.
fn operation_state(response: &ArmResponse) -> OperationState {
    match response.body.get("status").and_then(|v| v.as_str()) {
        Some("Succeeded") => OperationState::Succeeded,
        Some("Failed") | Some("Canceled") => {
            let message = response
                .body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("no error detail reported")
                .to_string();
            OperationState::Failed(message)
        }
        Some(_) => OperationState::Running,
        None => {
            if response.status == StatusCode::ACCEPTED {
                OperationState::Running
            } else {
                OperationState::Succeeded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::auth::TokenSource;
    use crate::resource::registry::get_resource;

    fn test_client() -> ArmClient {
        let credentials =
            ArmCredentials::new(TokenSource::Static("test-token".to_string())).unwrap();
        ArmClient::new(credentials, "00000000-0000-0000-0000-000000000000")
            .unwrap()
            .with_endpoint("https://example.test/")
    }

    #[test]
    fn test_resource_url_shape() {
        let client = test_client();
        let def = get_resource("storage-account").unwrap();
        let url = client.resource_url(def, "rg1", "acct1");
        assert_eq!(
            url,
            "https://example.test/subscriptions/00000000-0000-0000-0000-000000000000\
             /resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/acct1\
             ?api-version=2023-01-01"
        );
    }

    #[test]
    fn test_subscription_url_has_no_resource_group() {
        let client = test_client();
        let def = get_resource("container-group").unwrap();
        let url = client.subscription_url(def);
        assert!(!url.contains("resourceGroups"));
        assert!(url.contains("Microsoft.ContainerInstance/containerGroups"));
    }
}
