//! HTTP utilities for ARM REST API calls

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        // The cutoff may land inside a multibyte character; back up to the
        // nearest boundary
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..end],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// A decoded ARM response, including the headers the long-running
/// operation protocol uses
#[derive(Debug)]
pub struct ArmResponse {
    pub status: StatusCode,
    pub body: Value,
    /// `Azure-AsyncOperation` (or `Location` on 201/202) polling URL
    pub operation_url: Option<String>,
    /// Server-suggested polling delay
    pub retry_after: Option<Duration>,
}

impl ArmResponse {
    /// Human-readable error for a failed response, preferring the ARM
    /// error body (`error.code` / `error.message`) over the bare status.
    pub fn error_message(&self) -> String {
        format_arm_error(self.status, &self.body)
    }
}

/// HTTP client wrapper for ARM API calls
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
}

impl ArmHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("azrec/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request to an ARM endpoint
    pub async fn get(&self, url: &str, token: &str) -> Result<ArmResponse> {
        self.request(Method::GET, url, token, None).await
    }

    /// Make a PUT request to an ARM endpoint
    pub async fn put(&self, url: &str, token: &str, body: &Value) -> Result<ArmResponse> {
        self.request(Method::PUT, url, token, Some(body)).await
    }

    /// Make a DELETE request to an ARM endpoint
    pub async fn delete(&self, url: &str, token: &str) -> Result<ArmResponse> {
        self.request(Method::DELETE, url, token, None).await
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<ArmResponse> {
        let request_id = uuid::Uuid::new_v4();
        tracing::debug!("{} {} [{}]", method, url, request_id);

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("x-ms-client-request-id", request_id.to_string());

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let operation_url = extract_operation_url(status, response.headers());
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("ARM API error: {} - {}", status, sanitize_for_log(&text));
        }

        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };

        Ok(ArmResponse {
            status,
            body,
            operation_url,
            retry_after,
        })
    }
}

/// The async-operation URL, when the response indicates a long-running
/// operation. `Azure-AsyncOperation` wins over `Location`.
fn extract_operation_url(status: StatusCode, headers: &HeaderMap) -> Option<String> {
    if status != StatusCode::CREATED && status != StatusCode::ACCEPTED {
        return None;
    }
    headers
        .get("azure-asyncoperation")
        .or_else(|| headers.get("location"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Format an ARM API error for display
pub fn format_arm_error(status: StatusCode, body: &Value) -> String {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(|v| v.as_str()).unwrap_or("");
        let message = error.get("message").and_then(|v| v.as_str()).unwrap_or("");
        if !code.is_empty() || !message.is_empty() {
            return format!("{} ({}): {}", status, code, sanitize_for_log(message));
        }
    }

    match status.as_u16() {
        401 => "Authentication failed. Run 'az login' or set AZURE_CLIENT_ID/SECRET.".to_string(),
        403 => "Permission denied. Check your Azure RBAC role assignments.".to_string(),
        404 => "Resource not found.".to_string(),
        409 => "Resource conflict. The resource may already exist or be in use.".to_string(),
        429 => "Rate limit exceeded. Please try again later.".to_string(),
        500 | 503 => "Azure service temporarily unavailable. Please try again.".to_string(),
        _ => format!("ARM request failed: {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let long = "x".repeat(500);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.contains("truncated"));
        assert!(sanitized.len() < long.len());
    }

    #[test]
    fn test_sanitize_respects_char_boundaries() {
        // A multibyte character straddling the cutoff must not panic
        let body = format!("{}é and the rest of the message", "x".repeat(199));
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated"));
    }

    #[test]
    fn test_format_arm_error_handles_long_multibyte_messages() {
        let message = format!("{}é{}", "x".repeat(199), "y".repeat(50));
        let body = json!({"error": {"code": "BadRequest", "message": message}});
        let msg = format_arm_error(StatusCode::BAD_REQUEST, &body);
        assert!(msg.contains("BadRequest"));
        assert!(msg.contains("truncated"));
    }

    #[test]
    fn test_format_arm_error_prefers_error_body() {
        let body = json!({
            "error": {"code": "StorageAccountAlreadyTaken", "message": "The name is taken."}
        });
        let msg = format_arm_error(StatusCode::CONFLICT, &body);
        assert!(msg.contains("StorageAccountAlreadyTaken"));
        assert!(msg.contains("The name is taken."));
    }

    #[test]
    fn test_format_arm_error_falls_back_to_status() {
        let msg = format_arm_error(StatusCode::FORBIDDEN, &Value::Null);
        assert!(msg.contains("Permission denied"));
    }

    #[test]
    fn test_operation_url_only_on_async_statuses() {
        let mut headers = HeaderMap::new();
        headers.insert("azure-asyncoperation", "https://example/op/1".parse().unwrap());

        assert_eq!(
            extract_operation_url(StatusCode::ACCEPTED, &headers),
            Some("https://example/op/1".to_string())
        );
        assert_eq!(extract_operation_url(StatusCode::OK, &headers), None);
    }
}
