//! Errors returned by the DuploCloud control-plane client.

use serde_json::{Map, Value};
use thiserror::Error;

/// Status used for failures that never produced an HTTP response.
pub const NO_STATUS: i32 = -1;

/// An error from a control-plane API call.
///
/// Carries the HTTP status (or [`NO_STATUS`]), the request URL and the
/// decoded response body. `response["Message"]` is always present.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ClientError {
    message: String,
    status: i32,
    url: String,
    response: Map<String, Value>,
}

impl ClientError {
    fn without_status(url: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut response = Map::new();
        response.insert("Message".to_string(), Value::String(message.clone()));
        Self {
            message,
            status: NO_STATUS,
            url: url.into(),
            response,
        }
    }

    /// An error raised while building a request, before anything was sent.
    pub fn request(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::without_status(url, message)
    }

    /// A transport failure: connect, TLS, timeout or body read.
    pub fn io(url: impl Into<String>, err: &reqwest::Error) -> Self {
        Self::without_status(url, err.to_string())
    }

    /// A well-formed response that the client could not make sense of.
    pub fn app(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::without_status(url, message)
    }

    /// An error that is not tied to any request.
    pub fn new(message: impl Into<String>) -> Self {
        Self::without_status("", message)
    }

    /// Build an error from a non-success HTTP response.
    ///
    /// `path` is the URL path, used to detect legacy (non `/v3/`) endpoints
    /// whose 400 and 404 bodies say little about what went wrong.
    pub fn from_response(
        url: impl Into<String>,
        path: &str,
        status: u16,
        content_type: Option<&str>,
        body: &str,
    ) -> Self {
        let url = url.into();
        let mut message = body.to_string();

        if !path.starts_with("/v3/") && (status == 400 || status == 404) {
            message = format!("{}. Please verify object exists in duplocloud.", message);
        }

        let mut response = Map::new();
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .unwrap_or_default();
        if mime == "application/json" {
            match serde_json::from_str::<Value>(body) {
                Ok(Value::Object(parsed)) => response = parsed,
                Ok(_) => {},
                Err(err) => {
                    tracing::trace!(error = %err, body, "failed to parse error response JSON");
                },
            }
        }

        let message = format!("url: {}, status: {}, message: {}", url, status, message);
        tracing::trace!(%message, "control plane returned an error");

        if !response.contains_key("Message") {
            response.insert("Message".to_string(), Value::String(message.clone()));
        }

        Self {
            message,
            status: i32::from(status),
            url,
            response,
        }
    }

    /// The full error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The HTTP status, or [`NO_STATUS`] when no response was received.
    pub fn status(&self) -> i32 {
        self.status
    }

    /// The request URL, empty when the error is not tied to a request.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The decoded response body.
    pub fn response(&self) -> &Map<String, Value> {
        &self.response
    }

    /// True when the control plane reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// True when the failure may mean the endpoint does not exist on this
    /// control plane version, so an older API should be tried instead.
    pub fn possible_missing_api(&self) -> bool {
        self.status == 500 || self.status == 404
    }

    /// Prefix the message with caller context. Status, URL and response
    /// are kept.
    pub fn context(mut self, context: impl std::fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_path_not_found_message() {
        let err = ClientError::from_response(
            "https://duplo.example.com/subscriptions/t1/GetThing",
            "/subscriptions/t1/GetThing",
            404,
            Some("text/plain"),
            "Not Found",
        );

        assert_eq!(err.status(), 404);
        assert!(err.is_not_found());
        assert!(err.possible_missing_api());
        assert_eq!(
            err.message(),
            "url: https://duplo.example.com/subscriptions/t1/GetThing, status: 404, \
             message: Not Found. Please verify object exists in duplocloud."
        );
        assert_eq!(err.response()["Message"], Value::String(err.message().to_string()));
    }

    #[test]
    fn test_v3_path_keeps_body() {
        let err = ClientError::from_response(
            "https://duplo.example.com/v3/subscriptions/t1/aws/lbTargetGroup/tg",
            "/v3/subscriptions/t1/aws/lbTargetGroup/tg",
            400,
            None,
            "bad request",
        );

        assert!(err.message().ends_with("message: bad request"));
        assert!(!err.possible_missing_api());
    }

    #[test]
    fn test_json_body_is_decoded() {
        let err = ClientError::from_response(
            "https://duplo.example.com/v3/admin/plans/p1/kmsKeys",
            "/v3/admin/plans/p1/kmsKeys",
            500,
            Some("application/json; charset=utf-8"),
            r#"{"Message":"boom","Code":7}"#,
        );

        assert!(err.possible_missing_api());
        assert_eq!(err.response()["Message"], "boom");
        assert_eq!(err.response()["Code"], 7);
    }

    #[test]
    fn test_unparsable_json_body_gets_message() {
        let err = ClientError::from_response(
            "https://duplo.example.com/v3/x",
            "/v3/x",
            502,
            Some("application/json"),
            "<html>gateway</html>",
        );

        assert_eq!(err.status(), 502);
        assert!(!err.possible_missing_api());
        assert_eq!(err.response()["Message"], Value::String(err.message().to_string()));
    }

    #[test]
    fn test_statusless_errors() {
        let err = ClientError::new("replication controller list is nil");
        assert_eq!(err.status(), NO_STATUS);
        assert_eq!(err.url(), "");
        assert!(!err.is_not_found());
        assert!(!err.possible_missing_api());
        assert_eq!(err.to_string(), "replication controller list is nil");

        let err = ClientError::request("https://h/x", "cannot marshal request");
        assert_eq!(err.url(), "https://h/x");
        assert_eq!(err.response()["Message"], "cannot marshal request");
    }

    #[test]
    fn test_context_keeps_status() {
        let err = ClientError::from_response("https://h/v3/x", "/v3/x", 404, None, "gone")
            .context("Unable to retrieve tenant t1 target group tg");
        assert_eq!(err.status(), 404);
        assert!(err
            .message()
            .starts_with("Unable to retrieve tenant t1 target group tg: url: https://h/v3/x"));
    }
}
