//! Request description.

use reqwest::Method;
use serde::Serialize;

/// Body of a backend request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// Serialized as JSON
    Json(serde_json::Value),
    /// Sent as-is (file uploads, multipart payloads)
    Raw {
        /// Payload
        bytes: Vec<u8>,
        /// Value of the `Content-Type` header
        content_type: String,
    },
}

/// Method, extra headers and body of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// HTTP method
    pub method: Method,
    /// Headers added after the authorization header
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: RequestBody,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }
}

impl RequestOptions {
    /// Request with the given method and no body.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    /// Attach a JSON body.
    ///
    /// Values that cannot be represented as JSON are sent as `null`.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.body = RequestBody::Json(serde_json::to_value(body).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Request body is not serializable");
            serde_json::Value::Null
        }));
        self
    }

    /// Attach a raw body.
    pub fn raw(mut self, bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        self.body = RequestBody::Raw {
            bytes,
            content_type: content_type.into(),
        };
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let options = RequestOptions::new(Method::POST)
            .json(&serde_json::json!({"name": "run-1"}))
            .header("X-Request-Id", "abc");

        assert_eq!(options.method, Method::POST);
        assert_eq!(options.body, RequestBody::Json(serde_json::json!({"name": "run-1"})));
        assert_eq!(options.headers, vec![("X-Request-Id".to_string(), "abc".to_string())]);
    }

    #[test]
    fn test_raw_body() {
        let options = RequestOptions::new(Method::PUT).raw(vec![1, 2, 3], "application/octet-stream");
        assert!(matches!(
            options.body,
            RequestBody::Raw { ref bytes, ref content_type }
                if bytes == &[1, 2, 3] && content_type == "application/octet-stream"
        ));
    }
}
