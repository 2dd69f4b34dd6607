//! Response decoding.
//!
//! Bodies are decoded by content type. JSON that fails to parse degrades to
//! a placeholder payload instead of an error, so callers always get a value
//! to render.

use crate::error::{HttpError, HttpResult};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Message carried by the placeholder payload.
pub const PARSE_FAILURE_MESSAGE: &str = "Could not parse response";

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseContent {
    /// JSON document (or the parse-failure placeholder)
    Json(serde_json::Value),
    /// Any non-JSON content type
    Binary(Vec<u8>),
}

/// Status and decoded body of a backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Decoded body
    pub content: ResponseContent,
}

impl ApiResponse {
    /// Decode a body according to its content type.
    pub fn decode(status: u16, content_type: Option<&str>, body: &[u8]) -> Self {
        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();

        let content = if is_json_like(&content_type) {
            ResponseContent::Json(parse_json(body))
        } else {
            ResponseContent::Binary(body.to_vec())
        };

        Self { status, content }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// JSON body, if the response carried one.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match &self.content {
            ResponseContent::Json(value) => Some(value),
            ResponseContent::Binary(_) => None,
        }
    }

    /// Binary body, if the response carried one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.content {
            ResponseContent::Binary(bytes) => Some(bytes),
            ResponseContent::Json(_) => None,
        }
    }

    /// Deserialize the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> HttpResult<T> {
        let value = self
            .as_json()
            .ok_or_else(|| HttpError::InvalidResponse("Response is not JSON".to_string()))?;
        serde_json::from_value(value.clone()).map_err(|e| HttpError::InvalidResponse(e.to_string()))
    }
}

/// A missing content type is read as JSON; `text/*` exports stay binary.
fn is_json_like(content_type: &str) -> bool {
    content_type.is_empty() || content_type.contains("json")
}

fn parse_json(body: &[u8]) -> serde_json::Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::Value::Null;
    }

    serde_json::from_slice(body).unwrap_or_else(|e| {
        warn!(error = %e, "Response body is not valid JSON");
        serde_json::json!({ "error": PARSE_FAILURE_MESSAGE })
    })
}
