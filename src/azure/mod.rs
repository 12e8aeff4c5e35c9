//! Azure Resource Manager, Cost Management, Kudu and Entra ID (OAuth) calls.
//!
//! Every request goes through [`AzureClient::send`], which retries `429`
//! responses honouring `Retry-After` and otherwise backing off exponentially.

pub mod arm;
pub mod cost;
pub mod kudu;
pub mod oauth;

use reqwest::{header::HeaderMap, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::AzureConfig;

pub use arm::{ArmResourceGroup, ArmSite, ArmSubscription, NameAvailability, SiteAction, SiteRef};

#[derive(Debug, Error)]
pub enum AzureError {
    #[error("Azure API error ({status}): {body}")]
    Api { status: u16, body: Value },

    #[error("Too many retries (429 rate limited) after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unhandled app state: {0}")]
    UnhandledState(String),
}

impl AzureError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AzureError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct AzureClient {
    http: reqwest::Client,
    config: Arc<AzureConfig>,
}

impl AzureClient {
    pub fn new(config: AzureConfig) -> Result<Self, AzureError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("azora-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// `{management}{path}?api-version={version}`
    fn arm_url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.config.management_url, path, api_version)
    }

    /// Send with 429 retry. The request must be clonable (no streaming body).
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, AzureError> {
        let attempts = self.config.retry_attempts.max(1);

        for attempt in 0..attempts {
            let req = request
                .try_clone()
                .ok_or_else(|| AzureError::InvalidResponse("request body cannot be retried".to_string()))?;
            let response = req.send().await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }
            if attempt + 1 == attempts {
                break;
            }

            let wait = retry_delay(response.headers(), attempt, self.config.retry_base_delay_ms);
            warn!("429 received. Retrying after {} ms...", wait.as_millis());
            tokio::time::sleep(wait).await;
        }

        Err(AzureError::RateLimited { attempts })
    }
}

/// `Retry-After` (seconds) if present, else `base * 2^attempt` milliseconds
fn retry_delay(headers: &HeaderMap, attempt: u32, base_delay_ms: u64) -> Duration {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_millis(base_delay_ms.saturating_mul(1u64 << attempt.min(16))))
}

/// Body as JSON when it parses, as a string otherwise, `Null` when empty
pub(crate) async fn read_body(response: Response) -> Value {
    match response.text().await {
        Ok(text) if text.trim().is_empty() => Value::Null,
        Ok(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        Err(e) => Value::String(format!("Unable to read response body: {}", e)),
    }
}

/// Success body, or `AzureError::Api` carrying the upstream status and body
pub(crate) async fn expect_success(response: Response) -> Result<Value, AzureError> {
    let status = response.status();
    let body = read_body(response).await;
    if status.is_success() {
        Ok(body)
    } else {
        Err(AzureError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

/// `value` array of an ARM list response
pub(crate) fn list_values(body: &Value) -> Vec<Value> {
    body.get("value").and_then(Value::as_array).cloned().unwrap_or_default()
}
