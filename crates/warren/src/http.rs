//! HTTP plumbing shared by the monitors and the webhook notifier.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use warren_scheduler::{FailureCause, ProviderError};

/// Maximum response body kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Errors from outbound HTTP calls.
#[derive(Debug, Error)]
pub enum CheckError {
    /// Transport failure (connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The attempt was abandoned after its deadline.
    #[error("request cancelled")]
    Cancelled,
}

/// Provider error envelope: `{"error": {"type": ..., "code": ...}}`.
#[derive(Debug, Deserialize)]
struct ProviderEnvelope {
    error: ProviderBody,
}

#[derive(Debug, Deserialize)]
struct ProviderBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
}

impl FailureCause for CheckError {
    fn status(&self) -> Option<u16> {
        match self {
            CheckError::Http(e) => e.status().map(|s| s.as_u16()),
            CheckError::Status { status, .. } => Some(*status),
            CheckError::Json(_) | CheckError::Cancelled => None,
        }
    }

    fn provider_error(&self) -> Option<ProviderError> {
        let CheckError::Status { status, body } = self else {
            return None;
        };
        let envelope: Option<ProviderEnvelope> = serde_json::from_str(body).ok();
        Some(ProviderError {
            kind: envelope.as_ref().and_then(|e| e.error.kind.clone()),
            code: envelope.and_then(|e| e.error.code),
            status_code: Some(*status),
        })
    }

    fn response_status(&self) -> Option<u16> {
        match self {
            CheckError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Send a request and fail on non-success statuses.
pub async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, CheckError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CheckError::Status {
        status: status.as_u16(),
        body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
    })
}

/// Send a request and decode a JSON response body.
pub async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, CheckError> {
    let response = send(request).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
